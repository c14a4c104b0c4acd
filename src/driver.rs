//! Driver for the karst command line tool.
use crate::cmdline::Opts;
use itertools::Itertools;
use karst_ir::{Model, Printer, SramMacro};
use karst_opt::{Scheduler, SchedulerReport, analysis::exclusive_actions};
use karst_utils::{Error, Id, KarstResult};
use serde::Serialize;
use std::io::Write;

/// Whether the guards of two actions can hold at once.
#[derive(Serialize)]
struct GuardReport {
    first: Id,
    second: Id,
    exclusive: bool,
}

#[derive(Serialize)]
struct Output<'a> {
    model: Id,
    #[serde(flatten)]
    report: &'a SchedulerReport,
    guards: Vec<GuardReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sram: Option<SramMacro>,
}

fn spacing(s: Option<i64>) -> String {
    s.map_or_else(|| "random".to_string(), |s| s.to_string())
}

fn write_report(output: &Output, out: &mut impl Write) -> KarstResult<()> {
    let report = output.report;
    writeln!(
        out,
        "model {}: {} port(s), {}-bit addresses",
        output.model, report.num_ports, report.address_width
    )?;
    writeln!(out, "  minimum cycle: {}", report.minimum_cycle)?;
    writeln!(
        out,
        "  port size: {} word(s) (throughput {}, total {})",
        report.port_size, report.throughput_cycle, report.total_cycle
    )?;
    for (var, update) in &report.update_spacing {
        let access = report.access_spacing.get(var).copied().flatten();
        writeln!(
            out,
            "  {var}: update {}, access {}",
            spacing(*update),
            spacing(access)
        )?;
    }
    for site in &report.reads {
        writeln!(out, "  read  {}", site.index)?;
    }
    for site in &report.writes {
        writeln!(out, "  write {}", site.index)?;
    }
    if let Some(schedule) = &report.schedule {
        let var = |v: Option<Id>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
        writeln!(
            out,
            "  schedule: {} cycle(s), read {}{}, write {}",
            schedule.cycles,
            var(schedule.read_var),
            if schedule.prefetch_read { " (prefetch)" } else { "" },
            var(schedule.write_var)
        )?;
    }
    if let Some(sram) = &output.sram {
        writeln!(
            out,
            "  sram: {} x {} bits, ports {}",
            sram.size,
            sram.port_size,
            sram.ports()
                .iter()
                .map(|(name, width)| format!("{name}[{width}]"))
                .join(" ")
        )?;
    }
    for guard in &output.guards {
        let verdict = if guard.exclusive { "exclusive" } else { "may overlap" };
        writeln!(out, "  guards {}/{}: {verdict}", guard.first, guard.second)?;
    }
    Ok(())
}

fn configure(model: &mut Model, opts: &Opts) -> KarstResult<()> {
    let config = opts.configuration()?;
    if !config.is_empty() {
        model.configure(config)?;
    }
    Ok(())
}

/// Run karst from the command line.
pub fn run() -> KarstResult<()> {
    let opts = Opts::get_opts()?;

    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(opts.log_level)
        .target(env_logger::Target::Stderr)
        .init();

    let mut model = karst_models::define_model(&opts.model, opts.rows)?;
    configure(&mut model, &opts)?;
    let out = &mut std::io::stdout();

    if opts.print_ir {
        return Printer::write_model(&mut model, out);
    }

    let sram = opts
        .sram_size
        .map(|size| {
            let width = model
                .banks()
                .map(|b| b.borrow().width)
                .max()
                .unwrap_or(1);
            SramMacro::new(size, width, opts.partial_write, opts.ports, 1)
        })
        .transpose()?;
    let scheduler = match &sram {
        Some(sram) => Scheduler::with_macro(&mut model, sram)?,
        None => Scheduler::new(&mut model, opts.ports)?,
    };
    let throughput = opts.throughput.unwrap_or_else(|| scheduler.minimum_cycle());
    let total = opts.total.unwrap_or(throughput);
    let report = scheduler.report(throughput, total)?;
    let guards = exclusive_actions(&mut model)?
        .into_iter()
        .map(|pair| GuardReport {
            first: pair.first,
            second: pair.second,
            exclusive: pair.exclusive(),
        })
        .collect();
    let output = Output {
        model: model.name,
        report: &report,
        guards,
        sram,
    };

    if opts.json {
        serde_json::to_writer_pretty(&mut *out, &output)
            .map_err(|e| Error::misc(format!("cannot serialize report: {e}")))?;
        writeln!(out)?;
        Ok(())
    } else {
        write_report(&output, out)
    }
}
