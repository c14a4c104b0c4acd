use karst_ir::Printer;
use karst_models::*;

#[test]
fn sram_reads_back_writes() {
    let mut sram = define_sram().unwrap();
    sram.set("addr", 3).unwrap();
    sram.set("data_in", 42).unwrap();
    assert!(sram.call("write").unwrap().is_empty());
    sram.set("addr", 5).unwrap();
    sram.set("data_in", 7).unwrap();
    sram.call("write").unwrap();

    sram.set("addr", 3).unwrap();
    assert_eq!(sram.call("read").unwrap(), vec![42]);
    sram.set("addr", 5).unwrap();
    assert_eq!(sram.call("read").unwrap(), vec![7]);
    // enables are aliased onto `ren`/`wen` and dropped after the call
    assert_eq!(sram.get("ren").unwrap(), 0);
    assert!(sram.is_ready("write").unwrap());
    assert_eq!(sram.read_bank("mem", 3).unwrap(), 42);
}

#[test]
fn fifo_order_and_handshake() {
    let mut fifo = define_fifo().unwrap();
    // empty after reset: dequeue only returns the latched output
    assert_eq!(fifo.call("dequeue").unwrap(), vec![0]);
    assert!(!fifo.is_ready("dequeue").unwrap());
    assert_eq!(fifo.get("almost_empty").unwrap(), 1);

    for v in 1..=4 {
        assert!(fifo.is_ready("enqueue").unwrap());
        fifo.set("data_in", v).unwrap();
        fifo.call("enqueue").unwrap();
    }
    assert!(!fifo.is_ready("enqueue").unwrap());
    assert_eq!(fifo.get("almost_full").unwrap(), 1);

    assert_eq!(fifo.call("dequeue").unwrap(), vec![1]);
    assert_eq!(fifo.call("dequeue").unwrap(), vec![2]);
    for v in 5..=6 {
        fifo.set("data_in", v).unwrap();
        fifo.call("enqueue").unwrap();
    }
    // the write address wrapped around
    assert_eq!(fifo.read_bank("mem", 0).unwrap(), 5);
    let drained = (0..4)
        .map(|_| fifo.call("dequeue").unwrap()[0])
        .collect::<Vec<_>>();
    assert_eq!(drained, vec![3, 4, 5, 6]);
    assert!(!fifo.is_ready("dequeue").unwrap());
    assert_eq!(fifo.call("dequeue").unwrap(), vec![6]);
    assert_eq!(fifo.get("word_count").unwrap(), 0);
}

#[test]
fn fifo_clear_resets_state() {
    let mut fifo = define_fifo().unwrap();
    fifo.set("data_in", 9).unwrap();
    fifo.call("enqueue").unwrap();
    fifo.call("enqueue").unwrap();
    assert!(fifo.is_ready("dequeue").unwrap());
    fifo.call("clear").unwrap();
    assert!(!fifo.is_ready("dequeue").unwrap());
    assert_eq!(fifo.get("write_addr").unwrap(), 0);
    assert_eq!(fifo.get("word_count").unwrap(), 0);
}

#[test]
fn fifo_reconfiguration() {
    let mut fifo = define_fifo().unwrap();
    let before = fifo.produce_statements().unwrap().clone();
    assert_eq!(&before, fifo.produce_statements().unwrap());

    fifo.configure([("capacity", 8)]).unwrap();
    assert_eq!(fifo.bank("mem").unwrap().borrow().len(), 8);
    assert_ne!(&before, fifo.produce_statements().unwrap());
    for v in 0..8 {
        assert!(fifo.is_ready("enqueue").unwrap());
        fifo.set("data_in", v).unwrap();
        fifo.call("enqueue").unwrap();
    }
    assert!(!fifo.is_ready("enqueue").unwrap());
    assert!(fifo.configure([("depth", 3)]).is_err());
}

#[test]
fn rejected_configuration_changes_nothing() {
    let mut fifo = define_fifo().unwrap();
    let before = fifo.produce_statements().unwrap().clone();
    assert!(fifo.configure([("capacity", 8), ("bogus", 1)]).is_err());
    assert_eq!(fifo.config_value("capacity").unwrap(), 4);
    assert_eq!(fifo.bank("mem").unwrap().borrow().len(), 4);
    assert_eq!(&before, fifo.produce_statements().unwrap());

    // a negative bank size is caught before any bank is resized
    fifo.set("data_in", 5).unwrap();
    fifo.call("enqueue").unwrap();
    assert!(fifo.configure([("capacity", -1)]).is_err());
    assert_eq!(fifo.config_value("capacity").unwrap(), 4);
    assert_eq!(fifo.bank("mem").unwrap().borrow().len(), 4);
    assert_eq!(fifo.read_bank("mem", 0).unwrap(), 5);
}

#[test]
fn memory_size_follows_model_parameters() {
    let mut fifo = define_fifo().unwrap();
    fifo.configure([("capacity", 8)]).unwrap();
    assert_eq!(fifo.config_value("memory_size").unwrap(), 8);
    assert!(fifo.configure([("memory_size", 2)]).is_err());
    assert_eq!(fifo.bank("mem").unwrap().borrow().len(), 8);

    let mut lb = define_line_buffer(3).unwrap();
    lb.configure([("depth", 5)]).unwrap();
    assert_eq!(lb.config_value("memory_size").unwrap(), 15);
    assert_eq!(lb.bank("mem").unwrap().borrow().len(), 15);
    assert!(lb.configure([("memory_size", 4)]).is_err());
}

#[test]
fn line_buffer_windows() {
    let mut lb = define_line_buffer(2).unwrap();
    lb.configure([("depth", 3)]).unwrap();
    for v in 1..=6 {
        lb.set("data_in", v).unwrap();
        lb.call("enqueue").unwrap();
    }
    assert!(!lb.is_ready("enqueue").unwrap());
    assert!(lb.is_ready("dequeue").unwrap());
    assert_eq!(lb.call("dequeue").unwrap(), vec![1, 4]);
    assert!(!lb.is_ready("dequeue").unwrap());

    lb.set("data_in", 7).unwrap();
    lb.call("enqueue").unwrap();
    assert_eq!(lb.read_bank("mem", 0).unwrap(), 7);
    assert_eq!(lb.call("dequeue").unwrap(), vec![2, 5]);
    assert!(define_line_buffer(0).is_err());
}

#[test]
fn double_buffer_swaps_banks() {
    let mut db = define_double_buffer().unwrap();
    for v in 1..=3 {
        db.set("data_in", v).unwrap();
        db.call("write").unwrap();
    }
    assert_eq!(db.read_bank("buf0", 2).unwrap(), 3);
    db.call("swap").unwrap();
    assert_eq!(db.get("select").unwrap(), 1);
    let out = (0..3)
        .map(|_| db.call("read").unwrap()[0])
        .collect::<Vec<_>>();
    assert_eq!(out, vec![1, 2, 3]);

    db.set("data_in", 10).unwrap();
    db.call("write").unwrap();
    assert_eq!(db.read_bank("buf1", 0).unwrap(), 10);
}

#[test]
fn models_by_name() {
    for name in MODEL_NAMES {
        let mut m = define_model(name, 4).unwrap();
        let mut out = vec![];
        Printer::write_model(&mut m, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("model "));
    }
    assert!(define_model("cam", 4).is_err());
}
