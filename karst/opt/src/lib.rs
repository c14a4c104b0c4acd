//! Analyses and scheduling for karst models.
//!
//! [analysis] inspects the recorded statement traces of a [karst_ir::Model],
//! [symbolic] provides the small integer reasoning engine the analyses rely
//! on, and [Scheduler] combines both into the bandwidth requirements of a
//! model mapped onto a physical memory.
pub mod analysis;
mod scheduler;
pub mod symbolic;

pub use scheduler::{
    Schedule, Scheduler, SchedulerReport, Site, SiteReport,
};
