use karst_utils::{Error, KarstResult, bits_needed_for, is_power_of_two};

/// Physical memory macro a model is mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct SramMacro {
    /// Number of words.
    pub size: u64,
    /// Width of one word in bits.
    pub port_size: u64,
    /// Whether sub-word writes are supported.
    pub partial_write: bool,
    /// Number of physical ports.
    pub num_ports: u64,
    /// Number of ports with an independent enable.
    pub num_en_ports: u64,
}

impl SramMacro {
    pub fn new(
        size: u64,
        port_size: u64,
        partial_write: bool,
        num_ports: u64,
        num_en_ports: u64,
    ) -> KarstResult<Self> {
        if !is_power_of_two(size) {
            return Err(Error::malformed_structure(format!(
                "macro size {size} is not a power of two"
            )));
        }
        if !(1..=2).contains(&num_ports) {
            return Err(Error::malformed_structure(format!(
                "macro must have one or two ports, found {num_ports}"
            )));
        }
        if num_en_ports > num_ports {
            return Err(Error::malformed_structure(format!(
                "macro has {num_en_ports} enable ports but only {num_ports} ports"
            )));
        }
        Ok(Self {
            size,
            port_size,
            partial_write,
            num_ports,
            num_en_ports,
        })
    }

    pub fn address_width(&self) -> u64 {
        bits_needed_for(self.size)
    }

    /// Interface of the macro as `(name, width)` pairs. Chip enables are
    /// derived from the read and write enables.
    pub fn ports(&self) -> Vec<(String, u64)> {
        let en = 0..self.num_en_ports;
        let mut ports = vec![];
        ports.extend(en.clone().map(|i| (format!("wen{i}"), 1)));
        ports.extend(en.clone().map(|i| (format!("ren{i}"), 1)));
        ports.extend(
            (0..self.num_ports)
                .map(|i| (format!("addr{i}"), self.address_width())),
        );
        ports.extend(en.clone().map(|i| (format!("data_in{i}"), self.port_size)));
        ports.extend(en.clone().map(|i| (format!("data_out{i}"), self.port_size)));
        if self.partial_write {
            ports.extend(en.map(|i| (format!("wenb{i}"), 1)));
        }
        ports
    }
}

#[cfg(test)]
mod tests {
    use super::SramMacro;

    #[test]
    fn validates_shape() {
        let m = SramMacro::new(64, 32, false, 1, 1).unwrap();
        assert_eq!(m.address_width(), 6);
        assert!(SramMacro::new(48, 32, false, 1, 1).is_err());
        assert!(SramMacro::new(64, 32, false, 3, 1).is_err());
        assert!(SramMacro::new(64, 32, true, 1, 2).is_err());
    }

    #[test]
    fn port_list() {
        let m = SramMacro::new(256, 16, true, 2, 1).unwrap();
        let names: Vec<_> = m.ports().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec!["wen0", "ren0", "addr0", "addr1", "data_in0", "data_out0", "wenb0"]
        );
        assert_eq!(m.ports()[2].1, 8);
    }
}
