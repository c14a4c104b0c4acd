use crate::analysis::{
    get_memory_access, get_state_updates, get_updated_variables,
    get_var_memory_access, linear_spacing, root_variable, temporal_spacing,
};
use itertools::Itertools;
use karst_ir::{AccessType, Model, SramMacro, Value};
use karst_utils::{Error, Id, KarstResult};
use linked_hash_map::LinkedHashMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// An access site: an index expression and the variable driving it.
pub type Site = (Value, Id);

/// Bandwidth requirements of a model mapped onto a one- or two-port memory.
///
/// Construction runs the access, state update and spacing analyses over
/// every action of the model.
pub struct Scheduler {
    num_ports: u64,
    /// Address variable -> per-invocation advance, `None` if random.
    update_spacing: LinkedHashMap<Id, Option<i64>>,
    /// Address variable -> stride across its access sites, `None` if the
    /// sites do not form a progression.
    access_spacing: LinkedHashMap<Id, Option<i64>>,
    read_sites: Vec<Site>,
    write_sites: Vec<Site>,
    address_width: u64,
}

/// Merge a per-action result into a model-wide map. Disagreeing results
/// degrade to `None`.
fn merge(
    map: &mut LinkedHashMap<Id, Option<i64>>,
    var: Id,
    value: Option<i64>,
    what: &str,
) {
    let merged = match map.get(&var) {
        Some(prev) if *prev != value => {
            log::warn!(
                "{what} of `{var}' differs across actions \
                 ({prev:?} vs {value:?}), assuming random access"
            );
            None
        }
        _ => value,
    };
    map.insert(var, merged);
}

impl Scheduler {
    pub fn new(model: &mut Model, num_ports: u64) -> KarstResult<Self> {
        if !(1..=2).contains(&num_ports) {
            return Err(Error::malformed_structure(format!(
                "memories have one or two ports, requested {num_ports}"
            )));
        }
        let accesses = get_memory_access(model)?;
        let traces = model.produce_statements()?.clone();

        let mut update_spacing = LinkedHashMap::new();
        let mut access_spacing = LinkedHashMap::new();
        let mut read_sites: Vec<Site> = vec![];
        let mut write_sites: Vec<Site> = vec![];
        let mut widths = LinkedHashMap::new();

        for (action, stmts) in &traces {
            let Some(access) = accesses.get(action) else {
                continue;
            };
            let updates = get_updated_variables(&get_state_updates(stmts))?;
            let by_var = get_var_memory_access(access)?;
            let vars = by_var.keys().copied().collect_vec();
            for (var, spacing) in temporal_spacing(&updates, &vars)? {
                merge(&mut update_spacing, var, spacing, "update spacing");
            }
            for (var, sites) in by_var {
                if let Some((index, _)) = sites.first() {
                    widths.insert(var, root_variable(index)?.borrow().width);
                }
                // every access is a site, even when its index repeats
                for (index, ty) in &sites {
                    let list = match ty {
                        AccessType::Read => &mut read_sites,
                        AccessType::Write => &mut write_sites,
                    };
                    list.push((index.clone(), var));
                }
                let exprs = sites.into_iter().map(|(i, _)| i).collect_vec();
                let stride = match linear_spacing(&exprs)? {
                    (true, stride) if stride > 0 => Some(stride),
                    _ => None,
                };
                merge(&mut access_spacing, var, stride, "access spacing");
            }
        }

        let mut address_width = None;
        for (var, &width) in &widths {
            match address_width {
                Some(w) if w != width => {
                    return Err(Error::malformed_structure(format!(
                        "address `{var}' is {width} bits wide, expected {w}"
                    )));
                }
                _ => address_width = Some(width),
            }
        }

        log::debug!(
            "{}: {} read site(s), {} write site(s)",
            model.name,
            read_sites.len(),
            write_sites.len()
        );
        Ok(Self {
            num_ports,
            update_spacing,
            access_spacing,
            read_sites,
            write_sites,
            address_width: address_width.unwrap_or(0),
        })
    }

    /// Scheduler targeting a concrete memory macro.
    pub fn with_macro(model: &mut Model, sram: &SramMacro) -> KarstResult<Self> {
        if sram.num_en_ports > 1 {
            return Err(Error::unsupported("true dual-port memories"));
        }
        Self::new(model, sram.num_ports)
    }

    pub fn num_ports(&self) -> u64 {
        self.num_ports
    }

    pub fn update_spacing(&self) -> &LinkedHashMap<Id, Option<i64>> {
        &self.update_spacing
    }

    pub fn access_spacing(&self) -> &LinkedHashMap<Id, Option<i64>> {
        &self.access_spacing
    }

    pub fn read_sites(&self) -> &[Site] {
        &self.read_sites
    }

    pub fn write_sites(&self) -> &[Site] {
        &self.write_sites
    }

    /// Width shared by every address variable. 0 if the model never
    /// accesses memory.
    pub fn address_width(&self) -> u64 {
        self.address_width
    }

    fn count_accesses(&self, sites: &[Site]) -> u64 {
        let mut per_var: LinkedHashMap<Id, u64> = LinkedHashMap::new();
        for (_, var) in sites {
            let strided = self.access_spacing.get(var).copied().flatten().is_some();
            let count = per_var.entry(*var).or_insert(0);
            // random access costs one cycle however many sites use it
            *count = if strided { *count + 1 } else { 1 };
        }
        per_var.values().sum()
    }

    /// Cycles needed to serve every access site of the model.
    pub fn minimum_cycle(&self) -> u64 {
        let reads = self.count_accesses(&self.read_sites);
        let writes = self.count_accesses(&self.write_sites);
        if self.num_ports == 1 {
            reads + writes
        } else {
            reads.max(writes)
        }
    }

    fn throughput(&self, sites: &[Site], throughput_cycle: u64) -> u64 {
        sites
            .iter()
            .map(|(_, var)| {
                match self.update_spacing.get(var).copied().flatten() {
                    Some(stride) => {
                        1 + stride.unsigned_abs() * (throughput_cycle - 1)
                    }
                    None => 1,
                }
            })
            .sum()
    }

    /// Words per cycle the memory must provide to sustain one invocation
    /// every `throughput_cycle` cycles when accesses may be spread over
    /// `total_cycle` cycles.
    pub fn port_size(
        &self,
        throughput_cycle: u64,
        total_cycle: u64,
    ) -> KarstResult<u64> {
        let minimum = self.minimum_cycle();
        if throughput_cycle > total_cycle
            || throughput_cycle < minimum
            || total_cycle == 0
        {
            return Err(Error::pass_assumption(
                "scheduler",
                format!(
                    "need total ({total_cycle}) >= throughput \
                     ({throughput_cycle}) >= minimum ({minimum}) cycles \
                     and a non-zero total"
                ),
            ));
        }
        let reads = self.throughput(&self.read_sites, throughput_cycle);
        let writes = self.throughput(&self.write_sites, throughput_cycle);
        let words = if self.num_ports == 1 {
            reads + writes
        } else {
            reads.max(writes)
        };
        Ok(words.div_ceil(total_cycle))
    }

    fn driving_variable(sites: &[Site], dir: AccessType) -> KarstResult<Option<Id>> {
        let vars = sites.iter().map(|(_, v)| *v).unique().collect_vec();
        if vars.len() > 1 {
            return Err(Error::unsupported(format!(
                "scheduling {} {dir} address variables ({})",
                vars.len(),
                vars.iter().join(", ")
            )));
        }
        Ok(vars.first().copied())
    }

    /// Minimum-latency schedule for at most one read and one write address
    /// variable.
    pub fn schedule(&self) -> KarstResult<Schedule> {
        let cycles = self.minimum_cycle();
        let port_size = self.port_size(cycles, cycles)?;
        let read_var = Self::driving_variable(&self.read_sites, AccessType::Read)?;
        let write_var = Self::driving_variable(&self.write_sites, AccessType::Write)?;
        let prefetch_read = read_var.is_some_and(|v| {
            self.update_spacing.get(&v).copied().flatten().is_some()
        });
        log::info!(
            "schedule: {cycles} cycle(s), {port_size} word(s) per port{}",
            if prefetch_read { ", prefetching reads" } else { "" }
        );
        Ok(Schedule {
            cycles,
            port_size,
            read_var,
            write_var,
            prefetch_read,
        })
    }

    /// Summary of the analysis and the port width needed for the given
    /// cycle budget.
    pub fn report(
        &self,
        throughput_cycle: u64,
        total_cycle: u64,
    ) -> KarstResult<SchedulerReport> {
        let sites = |sites: &[Site]| {
            sites
                .iter()
                .map(|(index, root)| SiteReport {
                    index: index.to_string(),
                    root: *root,
                })
                .collect_vec()
        };
        let schedule = match self.schedule() {
            Ok(schedule) => Some(schedule),
            Err(e) => {
                log::warn!("no schedule: {}", e.message());
                None
            }
        };
        Ok(SchedulerReport {
            num_ports: self.num_ports,
            address_width: self.address_width,
            minimum_cycle: self.minimum_cycle(),
            throughput_cycle,
            total_cycle,
            port_size: self.port_size(throughput_cycle, total_cycle)?,
            update_spacing: sorted(&self.update_spacing),
            access_spacing: sorted(&self.access_spacing),
            reads: sites(&self.read_sites),
            writes: sites(&self.write_sites),
            schedule,
        })
    }
}

fn sorted(map: &LinkedHashMap<Id, Option<i64>>) -> BTreeMap<Id, Option<i64>> {
    map.iter().map(|(k, v)| (*k, *v)).collect()
}

/// Outcome of [Scheduler::schedule].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schedule {
    pub cycles: u64,
    pub port_size: u64,
    pub read_var: Option<Id>,
    pub write_var: Option<Id>,
    /// The read address advances predictably, so reads can be issued ahead
    /// of the writes within the cycle budget.
    pub prefetch_read: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteReport {
    pub index: String,
    pub root: Id,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerReport {
    pub num_ports: u64,
    pub address_width: u64,
    pub minimum_cycle: u64,
    pub throughput_cycle: u64,
    pub total_cycle: u64,
    pub port_size: u64,
    pub update_spacing: BTreeMap<Id, Option<i64>>,
    pub access_spacing: BTreeMap<Id, Option<i64>>,
    pub reads: Vec<SiteReport>,
    pub writes: Vec<SiteReport>,
    pub schedule: Option<Schedule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two address variables, one strided over four sites.
    fn striped() -> Model {
        let mut m = Model::new("striped", 64);
        m.define_bank("mem", 8).unwrap();
        let raddr = m.define_variable("raddr", 6, 0).unwrap();
        let waddr = m.define_variable("waddr", 6, 0).unwrap();
        let data_in = m.define_port_in("data_in", 8).unwrap();
        m.define_action("read", true, move |r| {
            let words = (0..4)
                .map(|i| r.mem("mem", (&raddr + 16 * i) % 64))
                .collect::<KarstResult<Vec<_>>>()?;
            r.assign(&raddr, (&raddr + 1) % 64)?;
            r.ret(words)
        })
        .unwrap();
        m.define_action("write", true, move |r| {
            let slot = r.mem("mem", &waddr)?;
            r.assign(slot, &data_in)?;
            r.assign(&waddr, (&waddr + 4) % 64)
        })
        .unwrap();
        m
    }

    #[test]
    fn strided_reads_count_per_site() {
        let mut m = striped();
        let s = Scheduler::new(&mut m, 1).unwrap();
        assert_eq!(s.access_spacing()[&Id::from("raddr")], Some(16));
        assert_eq!(s.access_spacing()[&Id::from("waddr")], None);
        assert_eq!(s.update_spacing()[&Id::from("raddr")], Some(1));
        assert_eq!(s.update_spacing()[&Id::from("waddr")], Some(4));
        assert_eq!(s.read_sites().len(), 4);
        assert_eq!(s.write_sites().len(), 1);
        assert_eq!(s.minimum_cycle(), 5);
        // reads: 4 * (1 + 1 * 5), writes: 1 + 4 * 5
        assert_eq!(s.port_size(6, 8).unwrap(), (24 + 21u64).div_ceil(8));
        assert!(s.port_size(4, 8).is_err());
        assert!(s.port_size(6, 5).is_err());
        assert_eq!(s.address_width(), 6);

        let dual = Scheduler::new(&mut m, 2).unwrap();
        assert_eq!(dual.minimum_cycle(), 4);
        assert_eq!(dual.port_size(4, 4).unwrap(), 4);
    }

    #[test]
    fn schedule_and_report() {
        let mut m = striped();
        let s = Scheduler::new(&mut m, 1).unwrap();
        let schedule = s.schedule().unwrap();
        assert_eq!(schedule.cycles, 5);
        assert_eq!(schedule.read_var, Some(Id::from("raddr")));
        assert_eq!(schedule.write_var, Some(Id::from("waddr")));
        assert!(schedule.prefetch_read);

        let report = s.report(5, 5).unwrap();
        assert_eq!(report.reads.len(), 4);
        assert_eq!(report.reads[1].index, "((raddr + 16) % 64)");
        assert_eq!(report.schedule, Some(schedule));
    }

    #[test]
    fn repeated_indices_are_separate_sites() {
        let mut m = Model::new("m", 64);
        m.define_bank("mem", 8).unwrap();
        let a = m.define_variable("a", 6, 0).unwrap();
        m.define_action("read", true, move |r| {
            let words = [a.clone(), a.clone(), &a + 10]
                .into_iter()
                .map(|index| r.mem("mem", index))
                .collect::<KarstResult<Vec<_>>>()?;
            r.assign(&a, &a + 1)?;
            r.ret(words)
        })
        .unwrap();
        let s = Scheduler::new(&mut m, 1).unwrap();
        assert_eq!(s.access_spacing()[&Id::from("a")], Some(10));
        assert_eq!(s.read_sites().len(), 3);
        assert_eq!(s.minimum_cycle(), 3);
    }

    #[test]
    fn port_counts_are_checked() {
        let mut m = striped();
        assert!(Scheduler::new(&mut m, 3).is_err());
        let dual_en = SramMacro::new(64, 8, false, 2, 2).unwrap();
        assert!(Scheduler::with_macro(&mut m, &dual_en).is_err());
        let single = SramMacro::new(64, 8, false, 1, 1).unwrap();
        assert_eq!(Scheduler::with_macro(&mut m, &single).unwrap().num_ports(), 1);
    }

    #[test]
    fn mismatched_address_widths() {
        let mut m = Model::new("m", 16);
        m.define_bank("mem", 8).unwrap();
        let a = m.define_variable("a", 4, 0).unwrap();
        let b = m.define_variable("b", 3, 0).unwrap();
        m.define_action("read", true, move |r| {
            let word = r.mem("mem", &a)?;
            r.ret([word])
        })
        .unwrap();
        m.define_action("write", true, move |r| {
            let slot = r.mem("mem", &b)?;
            r.assign(slot, 1)
        })
        .unwrap();
        assert!(Scheduler::new(&mut m, 1).is_err());
    }
}
