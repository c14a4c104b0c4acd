use karst_ir::{AccessType, Model, SramMacro};
use karst_models::*;
use karst_opt::analysis::{
    exclusive_actions, get_memory_access, get_var_memory_access,
    linear_spacing,
};
use karst_opt::Scheduler;
use karst_utils::{ErrorKind, Id};

fn id(name: &str) -> Id {
    Id::from(name)
}

#[test]
fn fifo_single_port() {
    let mut fifo = define_fifo().unwrap();
    let s = Scheduler::new(&mut fifo, 1).unwrap();
    assert_eq!(s.update_spacing().len(), 2);
    assert_eq!(s.update_spacing()[&id("read_addr")], Some(1));
    assert_eq!(s.update_spacing()[&id("write_addr")], Some(1));
    assert_eq!(s.access_spacing()[&id("read_addr")], None);
    assert_eq!(s.minimum_cycle(), 2);
    assert_eq!(s.port_size(2, 2).unwrap(), 2);
    assert!(s.port_size(1, 1).is_err());
    assert_eq!(s.address_width(), 16);
}

#[test]
fn fifo_dual_port() {
    let mut fifo = define_fifo().unwrap();
    let sram = SramMacro::new(64, 16, false, 2, 1).unwrap();
    let s = Scheduler::with_macro(&mut fifo, &sram).unwrap();
    assert_eq!(s.minimum_cycle(), 1);
    assert_eq!(s.port_size(1, 1).unwrap(), 1);
    // a longer budget for the same throughput needs a narrower port
    assert_eq!(s.port_size(2, 4).unwrap(), 1);

    let schedule = s.schedule().unwrap();
    assert_eq!(schedule.cycles, 1);
    assert_eq!(schedule.read_var, Some(id("read_addr")));
    assert_eq!(schedule.write_var, Some(id("write_addr")));
    assert!(schedule.prefetch_read);
}

#[test]
fn sram_is_random_access() {
    let mut sram = define_sram().unwrap();
    let s = Scheduler::new(&mut sram, 1).unwrap();
    assert_eq!(s.update_spacing().len(), 1);
    assert_eq!(s.update_spacing()[&id("addr")], None);
    assert_eq!(s.access_spacing()[&id("addr")], None);
    assert_eq!(s.minimum_cycle(), 2);
    // random access needs one word per site whatever the budget
    assert_eq!(s.port_size(4, 4).unwrap(), 1);

    let schedule = s.schedule().unwrap();
    assert!(!schedule.prefetch_read);
    assert_eq!(schedule.read_var, schedule.write_var);
}

#[test]
fn line_buffer_fan_out() {
    let mut lb = define_line_buffer(4).unwrap();
    let accesses = get_memory_access(&mut lb).unwrap();
    let dequeue = &accesses[&id("dequeue")];
    assert_eq!(dequeue.len(), 4);
    assert!(dequeue.iter().all(|(_, t)| *t == AccessType::Read));
    let by_var = get_var_memory_access(dequeue).unwrap();
    assert_eq!(by_var.len(), 1);
    let indices = by_var[&id("read_addr")]
        .iter()
        .map(|(index, _)| index.clone())
        .collect::<Vec<_>>();
    assert_eq!(linear_spacing(&indices).unwrap(), (true, 10));

    let s = Scheduler::new(&mut lb, 1).unwrap();
    assert_eq!(s.read_sites().len(), 4);
    for (_, var) in s.read_sites() {
        assert_eq!(s.update_spacing()[var], Some(1));
        assert_eq!(s.access_spacing()[var], Some(10));
    }
    assert_eq!(s.minimum_cycle(), 5);
}

#[test]
fn line_buffer_follows_configuration() {
    let mut lb = define_line_buffer(4).unwrap();
    lb.configure([("depth", 42)]).unwrap();
    let s = Scheduler::new(&mut lb, 2).unwrap();
    assert_eq!(s.access_spacing()[&id("read_addr")], Some(42));
    assert_eq!(s.update_spacing()[&id("write_addr")], Some(1));
    assert_eq!(s.minimum_cycle(), 4);
}

#[test]
fn line_buffer_recorded_as_a_loop() {
    let (rows, depth) = (4, 10);
    let size = rows * depth;
    let mut m = Model::new("looped_line_buffer", size);
    m.define_bank("mem", 16).unwrap();
    let addr = m.define_variable("read_addr", 16, 0).unwrap();
    let out = m.define_port_out("data_out", 16, 0).unwrap();
    m.define_action("dequeue", true, move |r| {
        r.for_range(rows, "i", |r, i| {
            let word = r.mem("mem", (&addr + &i * depth) % size)?;
            r.assign(&out, word)
        })?;
        r.assign(&addr, (&addr + 1) % size)?;
        r.ret([&out])
    })
    .unwrap();

    let s = Scheduler::new(&mut m, 1).unwrap();
    assert_eq!(s.read_sites().len(), 4);
    assert!(s.read_sites().iter().all(|(_, var)| *var == id("read_addr")));
    assert_eq!(s.access_spacing()[&id("read_addr")], Some(depth));
    assert_eq!(s.update_spacing()[&id("read_addr")], Some(1));
    assert_eq!(s.minimum_cycle(), 4);
}

#[test]
fn double_buffer_schedule() {
    let mut db = define_double_buffer().unwrap();
    let s = Scheduler::new(&mut db, 2).unwrap();
    assert_eq!(s.update_spacing()[&id("read_addr")], Some(1));
    assert_eq!(s.update_spacing()[&id("write_addr")], Some(1));
    let schedule = s.schedule().unwrap();
    assert_eq!(schedule.cycles, 1);
    assert!(schedule.prefetch_read);

    let report = s.report(2, 2).unwrap();
    assert_eq!(report.port_size, 1);
    assert_eq!(report.reads.len(), 1);
    assert_eq!(report.writes[0].root, id("write_addr"));
}

#[test]
fn multiple_read_addresses_are_unsupported() {
    let mut m = Model::new("two_readers", 8);
    m.define_bank("mem", 8).unwrap();
    let a = m.define_variable("a", 3, 0).unwrap();
    let b = m.define_variable("b", 3, 0).unwrap();
    m.define_action("read_a", true, move |r| {
        let word = r.mem("mem", &a)?;
        r.ret([word])
    })
    .unwrap();
    m.define_action("read_b", true, move |r| {
        let word = r.mem("mem", &b)?;
        r.ret([word])
    })
    .unwrap();
    let s = Scheduler::new(&mut m, 1).unwrap();
    assert_eq!(s.minimum_cycle(), 2);
    let err = s.schedule().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Unsupported(_)));
    // the report still carries the bounds
    assert!(s.report(2, 2).unwrap().schedule.is_none());
}

#[test]
fn guards_of_buffered_models() {
    let mut lb = define_line_buffer(2).unwrap();
    let pairs = exclusive_actions(&mut lb).unwrap();
    assert_eq!(pairs.len(), 1);
    assert!(pairs[0].exclusive());

    let mut fifo = define_fifo().unwrap();
    let pairs = exclusive_actions(&mut fifo).unwrap();
    assert_eq!(pairs.len(), 1);
    assert!(!pairs[0].exclusive());
}
