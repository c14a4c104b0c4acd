//! Memory models built on the karst IR.
//!
//! Each function returns a freshly declared [Model]. Sizes are configurables
//! with small defaults and can be changed with [Model::configure]; traces
//! are recorded against the configuration in effect when they are first
//! requested.
use karst_ir::{Model, Recorder, Value, reserved_names::MEMORY_SIZE};
use karst_utils::{Error, Id, KarstResult};

/// Default number of words in the SRAM and double buffer banks.
pub const DEFAULT_MEMORY_SIZE: i64 = 16;
/// Default FIFO capacity.
pub const DEFAULT_FIFO_CAPACITY: i64 = 4;
/// Default length of one line buffer row.
pub const DEFAULT_LINE_DEPTH: i64 = 10;

const DATA_WIDTH: u64 = 16;
const ADDR_WIDTH: u64 = 16;

/// Drive `port` high when `cond` holds and low otherwise.
fn flag(r: &mut Recorder<'_>, cond: Value, port: &Value) -> KarstResult<()> {
    r.if_else(cond, |r| r.assign(port, 1), |r| r.assign(port, 0))
}

/// Single-bank SRAM with one shared address port.
///
/// `read` and `write` use the `ren`/`wen` inputs as their enables and share
/// the `ready` output, which stays asserted.
pub fn define_sram() -> KarstResult<Model> {
    let mut m = Model::new("sram", DEFAULT_MEMORY_SIZE);
    m.define_bank("mem", DATA_WIDTH)?;
    m.define_port_in("ren", 1)?;
    m.define_port_in("wen", 1)?;
    m.define_port_out("ready", 1, 1)?;
    let addr = m.define_port_in("addr", ADDR_WIDTH)?;
    let data_in = m.define_port_in("data_in", DATA_WIDTH)?;
    let data_out = m.define_port_out("data_out", DATA_WIDTH, 0)?;

    let read_addr = addr.clone();
    m.define_action_on("read", "ren", "ready", move |r| {
        let word = r.mem("mem", &read_addr)?;
        r.assign(&data_out, word)?;
        r.ret([&data_out])
    })?;
    m.define_action_on("write", "wen", "ready", move |r| {
        let slot = r.mem("mem", &addr)?;
        r.assign(slot, &data_in)
    })?;
    log::debug!("defined {}", m.name);
    Ok(m)
}

fn fifo_flags(r: &mut Recorder<'_>, capacity: i64) -> KarstResult<()> {
    let count = r.value("word_count")?;
    let almost_empty = r.value("almost_empty")?;
    let almost_full = r.value("almost_full")?;
    let enq = r.value("RDY_enqueue")?;
    let deq = r.value("RDY_dequeue")?;
    flag(r, count.le(1), &almost_empty)?;
    flag(r, count.ge(capacity - 1), &almost_full)?;
    flag(r, count.lt(capacity), &enq)?;
    flag(r, count.gt(0), &deq)
}

/// Circular FIFO over a bank of `capacity` words.
///
/// `clear` is the reset action. The ready outputs of `enqueue` and
/// `dequeue` track the number of buffered words. `memory_size` follows
/// `capacity`.
pub fn define_fifo() -> KarstResult<Model> {
    let mut m = Model::new("fifo", DEFAULT_FIFO_CAPACITY);
    let capacity = m.define_configurable("capacity", 16, DEFAULT_FIFO_CAPACITY)?;
    m.derive_memory_size(&capacity)?;
    m.define_bank("mem", DATA_WIDTH)?;
    let data_in = m.define_port_in("data_in", DATA_WIDTH)?;
    let data_out = m.define_port_out("data_out", DATA_WIDTH, 0)?;
    let almost_empty = m.define_port_out("almost_empty", 1, 1)?;
    let almost_full = m.define_port_out("almost_full", 1, 0)?;
    let read_addr = m.define_variable("read_addr", ADDR_WIDTH, 0)?;
    let write_addr = m.define_variable("write_addr", ADDR_WIDTH, 0)?;
    let word_count = m.define_variable("word_count", ADDR_WIDTH, 0)?;

    let (addr, count) = (write_addr.clone(), word_count.clone());
    m.define_action("enqueue", true, move |r| {
        let capacity = r.config("capacity")?;
        r.expect(count.lt(capacity));
        let slot = r.mem("mem", &addr)?;
        r.assign(slot, &data_in)?;
        r.assign(&addr, (&addr + 1) % capacity)?;
        r.assign(&count, &count + 1)?;
        fifo_flags(r, capacity)
    })?;

    let (addr, count) = (read_addr.clone(), word_count.clone());
    m.define_action("dequeue", false, move |r| {
        let capacity = r.config("capacity")?;
        r.expect(count.gt(0));
        let word = r.mem("mem", &addr)?;
        r.assign(&data_out, word)?;
        r.assign(&addr, (&addr + 1) % capacity)?;
        r.assign(&count, &count - 1)?;
        fifo_flags(r, capacity)?;
        r.ret([&data_out])
    })?;

    m.define_action("clear", true, move |r| {
        for var in [&read_addr, &write_addr, &word_count, &almost_full] {
            r.assign(var, 0)?;
        }
        r.assign(&almost_empty, 1)?;
        let enq = r.value("RDY_enqueue")?;
        let deq = r.value("RDY_dequeue")?;
        r.assign(&enq, 1)?;
        r.assign(&deq, 0)
    })?;
    m.set_reset_action("clear")?;
    log::debug!("defined {}", m.name);
    Ok(m)
}

fn line_buffer_flags(
    r: &mut Recorder<'_>,
    count: &Value,
    size: i64,
) -> KarstResult<()> {
    let enq = r.value("RDY_enqueue")?;
    let deq = r.value("RDY_dequeue")?;
    flag(r, count.lt(size), &enq)?;
    flag(r, count.ge(size), &deq)
}

/// Line buffer holding `rows` rows of `depth` words. `dequeue` reads one
/// word from every row through `data_out_<i>`. `memory_size` follows
/// `depth * rows`.
pub fn define_line_buffer(rows: u64) -> KarstResult<Model> {
    if rows == 0 {
        return Err(Error::invalid_input("a line buffer needs at least one row"));
    }
    let rows = rows as i64;
    let mut m = Model::new("line_buffer", DEFAULT_LINE_DEPTH * rows);
    let depth = m.define_configurable("depth", 16, DEFAULT_LINE_DEPTH)?;
    m.derive_memory_size(&depth * rows)?;
    m.define_bank("mem", DATA_WIDTH)?;
    let data_in = m.define_port_in("data_in", DATA_WIDTH)?;
    let outputs = (0..rows)
        .map(|i| m.define_port_out(format!("data_out_{i}"), DATA_WIDTH, 0))
        .collect::<KarstResult<Vec<_>>>()?;
    let read_addr = m.define_variable("read_addr", ADDR_WIDTH, 0)?;
    let write_addr = m.define_variable("write_addr", ADDR_WIDTH, 0)?;
    let word_count = m.define_variable("word_count", ADDR_WIDTH, 0)?;

    let (addr, count) = (write_addr.clone(), word_count.clone());
    m.define_action("enqueue", true, move |r| {
        let size = r.config("depth")? * rows;
        r.expect(count.lt(size));
        let slot = r.mem("mem", &addr)?;
        r.assign(slot, &data_in)?;
        r.assign(&addr, (&addr + 1) % size)?;
        r.assign(&count, &count + 1)?;
        line_buffer_flags(r, &count, size)
    })?;

    let (addr, count) = (read_addr.clone(), word_count.clone());
    m.define_action("dequeue", false, move |r| {
        let depth = r.config("depth")?;
        let size = depth * rows;
        r.expect(count.ge(size));
        // one access site per row
        for (i, out) in outputs.iter().enumerate() {
            let word = r.mem("mem", (&addr + depth * i as i64) % size)?;
            r.assign(out, word)?;
        }
        r.assign(&addr, (&addr + 1) % size)?;
        r.assign(&count, &count - 1)?;
        line_buffer_flags(r, &count, size)?;
        r.ret(outputs.iter())
    })?;

    m.define_action("clear", true, move |r| {
        for var in [&read_addr, &write_addr, &word_count] {
            r.assign(var, 0)?;
        }
        let enq = r.value("RDY_enqueue")?;
        let deq = r.value("RDY_dequeue")?;
        r.assign(&enq, 1)?;
        r.assign(&deq, 0)
    })?;
    m.set_reset_action("clear")?;
    log::debug!("defined {} with {rows} row(s)", m.name);
    Ok(m)
}

/// Two banks used as a ping-pong buffer: writes fill the bank picked by
/// `select`, reads drain the other one and `swap` exchanges them. `clear`
/// is the reset action.
pub fn define_double_buffer() -> KarstResult<Model> {
    let mut m = Model::new("double_buffer", DEFAULT_MEMORY_SIZE);
    let size = m.value(MEMORY_SIZE)?;
    let banks = m
        .define_banks("buf", 2, DATA_WIDTH, size)?
        .into_iter()
        .map(|b| b.as_str())
        .collect::<Vec<_>>();
    let data_in = m.define_port_in("data_in", DATA_WIDTH)?;
    let data_out = m.define_port_out("data_out", DATA_WIDTH, 0)?;
    let select = m.define_variable("select", 1, 0)?;
    let read_addr = m.define_variable("read_addr", ADDR_WIDTH, 0)?;
    let write_addr = m.define_variable("write_addr", ADDR_WIDTH, 0)?;

    let (sel, addr, names) = (select.clone(), write_addr.clone(), banks.clone());
    m.define_action("write", true, move |r| {
        let size = r.config(MEMORY_SIZE)?;
        let slot = r.select(&sel, &names, &addr)?;
        r.assign(slot, &data_in)?;
        r.assign(&addr, (&addr + 1) % size)
    })?;

    let (sel, addr) = (select.clone(), read_addr.clone());
    m.define_action("read", true, move |r| {
        let size = r.config(MEMORY_SIZE)?;
        let word = r.select(1 - sel.clone(), &banks, &addr)?;
        r.assign(&data_out, word)?;
        r.assign(&addr, (&addr + 1) % size)?;
        r.ret([&data_out])
    })?;

    let (sel, r_addr, w_addr) =
        (select.clone(), read_addr.clone(), write_addr.clone());
    m.define_action("swap", true, move |r| {
        r.assign(&sel, 1 - sel.clone())?;
        r.assign(&r_addr, 0)?;
        r.assign(&w_addr, 0)
    })?;

    m.define_action("clear", true, move |r| {
        for var in [&select, &read_addr, &write_addr] {
            r.assign(var, 0)?;
        }
        Ok(())
    })?;
    m.set_reset_action("clear")?;
    log::debug!("defined {}", m.name);
    Ok(m)
}

/// Every model this crate defines, by the name the command line uses.
pub const MODEL_NAMES: &[&str] = &["sram", "fifo", "line-buffer", "double-buffer"];

/// Build a model by name. `rows` is only used by the line buffer.
pub fn define_model(name: &str, rows: u64) -> KarstResult<Model> {
    match name {
        "sram" => define_sram(),
        "fifo" => define_fifo(),
        "line-buffer" => define_line_buffer(rows),
        "double-buffer" => define_double_buffer(),
        other => Err(Error::undefined(Id::from(other), "model")),
    }
}
