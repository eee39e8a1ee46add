//! Restart recovery of the proposer sequence.

use crate::council::WeightedCouncil;
use crate::validator::WeightedValidator;
use council_types::Address;
use tracing::{error, trace};

impl WeightedCouncil {
    /// Rebuild the proposer sequence from a persisted address list
    /// after a restart.
    ///
    /// An address that no longer resolves to a council member keeps
    /// its slot through a zero-weight placeholder validator, so the
    /// round-robin positions of every other proposer survive intact.
    /// This mirrors the historical recovery path; membership catches
    /// up at the next refresh.
    pub fn recover_proposers(&self, proposer_addrs: &[Address]) {
        let mut core = self.core_write();

        let mut proposers = Vec::with_capacity(proposer_addrs.len());
        for (i, addr) in proposer_addrs.iter().enumerate() {
            let val = match core.validators.iter().find(|v| v.address() == *addr) {
                Some(val) => val.clone(),
                None => {
                    error!(proposer = %addr, "proposer is not available now");
                    WeightedValidator::new(*addr, Address::ZERO, 0, 0)
                }
            };
            trace!(i, address = %val.address(), "recovered proposer");
            proposers.push(val);
        }

        core.proposers = proposers;
    }
}

#[cfg(test)]
mod tests {
    use crate::council::WeightedCouncil;
    use council_types::{Address, ChainParams, ProposerPolicy};

    fn addr(byte: u8) -> Address {
        Address::from_slice(&[byte])
    }

    #[test]
    fn recovery_restores_sequence_positions() {
        let set = WeightedCouncil::new(
            &[addr(1), addr(2), addr(3)],
            None,
            None,
            None,
            ProposerPolicy::WeightedRandom,
            21,
            0,
            0,
            ChainParams::default(),
        )
        .unwrap();

        set.recover_proposers(&[addr(2), addr(2), addr(1), addr(3)]);
        let recovered: Vec<Address> = set.proposers().iter().map(|p| p.address()).collect();
        assert_eq!(recovered, vec![addr(2), addr(2), addr(1), addr(3)]);

        // Recovered members are the live handles.
        set.list()[1].store_weight(42);
        assert_eq!(set.proposers()[0].weight(), 42);
    }

    #[test]
    fn unknown_addresses_become_placeholders() {
        let set = WeightedCouncil::new(
            &[addr(1), addr(2)],
            None,
            None,
            None,
            ProposerPolicy::WeightedRandom,
            21,
            0,
            0,
            ChainParams::default(),
        )
        .unwrap();

        set.recover_proposers(&[addr(1), addr(9), addr(2)]);
        let proposers = set.proposers();
        assert_eq!(proposers.len(), 3);
        assert_eq!(proposers[1].address(), addr(9));
        assert_eq!(proposers[1].weight(), 0);
        assert!(set.get_by_address(addr(9)).is_none());
    }
}
