//! The weighted council: an ordered validator set with a committee
//! size, a current proposer, and a rolling proposer sequence.

use crate::error::CouncilError;
use crate::selector;
use crate::validator::{
    FlatVotingPower, VotingPowerCalculator, WeightedValidator, DEFAULT_VOTING_POWER,
};
use crate::StakingSource;
use arc_swap::ArcSwapOption;
use council_types::{
    gini_coefficient, Address, ChainParams, DeterministicRng, Hash, ProposerPolicy, StakingInfo,
    View,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Mutable core of a council, guarded by one readers-writer lock.
#[derive(Debug)]
pub(crate) struct CouncilCore {
    /// Sorted by address; addresses are unique.
    pub validators: Vec<Arc<WeightedValidator>>,
    /// Shuffle output of the last refresh. Each validator appears
    /// `weight` times; if every weight is zero, each appears once.
    pub proposers: Vec<Arc<WeightedValidator>>,
    /// Block at which `proposers` was last recomputed.
    pub proposers_block_num: u64,
    /// Last observed staking snapshot.
    pub staking_info: Option<StakingInfo>,
    /// Block this council is associated with.
    pub block_num: u64,
}

/// Snapshot dump of a council, aligned column-wise, for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouncilData {
    pub validators: Vec<Address>,
    pub reward_addrs: Vec<Address>,
    pub voting_powers: Vec<u64>,
    pub weights: Vec<u64>,
    pub proposers: Vec<Address>,
    pub proposers_block_num: u64,
}

/// Weighted, committee-based validator set.
///
/// See the crate docs for the concurrency model. All methods return
/// immediately; [`refresh`](Self::refresh) is the only one that calls
/// out (to the staking source).
#[derive(Debug)]
pub struct WeightedCouncil {
    sub_size: AtomicU64,
    policy: ProposerPolicy,
    params: ChainParams,
    /// Current round's proposer; lock-free so the hot path
    /// (`get_proposer`) never touches the council lock.
    proposer: ArcSwapOption<WeightedValidator>,
    core: RwLock<CouncilCore>,
}

impl WeightedCouncil {
    /// Build a council for `block_num` from aligned columns. Missing
    /// columns get defaults: zero reward addresses, flat voting power,
    /// zero weights. Validators are sorted by address; duplicates are
    /// rejected.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        addrs: &[Address],
        rewards: Option<Vec<Address>>,
        voting_powers: Option<Vec<u64>>,
        weights: Option<Vec<u64>>,
        policy: ProposerPolicy,
        committee_size: u64,
        block_num: u64,
        proposers_block_num: u64,
        params: ChainParams,
    ) -> Result<Self, CouncilError> {
        let rewards = rewards.unwrap_or_else(|| vec![Address::ZERO; addrs.len()]);
        let voting_powers = voting_powers.unwrap_or_else(|| {
            let calc = FlatVotingPower;
            addrs.iter().map(|_| calc.voting_power_of(0)).collect()
        });
        let weights = weights.unwrap_or_else(|| vec![0; addrs.len()]);

        if addrs.len() != rewards.len()
            || addrs.len() != voting_powers.len()
            || addrs.len() != weights.len()
        {
            return Err(CouncilError::IncompleteCouncilData {
                addrs: addrs.len(),
                rewards: rewards.len(),
                voting_powers: voting_powers.len(),
                weights: weights.len(),
            });
        }

        let mut validators: Vec<Arc<WeightedValidator>> = addrs
            .iter()
            .zip(rewards)
            .zip(voting_powers)
            .zip(weights)
            .map(|(((addr, reward), vp), w)| WeightedValidator::new(*addr, reward, vp, w))
            .collect();
        validators.sort_by_key(|v| v.address());
        for pair in validators.windows(2) {
            if pair[0].address() == pair[1].address() {
                return Err(CouncilError::DuplicateValidator(pair[0].address()));
            }
        }

        let proposer = ArcSwapOption::new(validators.first().cloned());
        // Until the first refresh, the proposer sequence is the sorted
        // validator list itself.
        let proposers = validators.clone();

        trace!(block_num, validators = validators.len(), "allocate council");
        Ok(Self {
            sub_size: AtomicU64::new(committee_size),
            policy,
            params,
            proposer,
            core: RwLock::new(CouncilCore {
                validators,
                proposers,
                proposers_block_num,
                staking_info: None,
                block_num,
            }),
        })
    }

    pub fn policy(&self) -> ProposerPolicy {
        self.policy
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Number of validators.
    pub fn size(&self) -> u64 {
        self.core.read().validators.len() as u64
    }

    /// Committee target size.
    pub fn sub_group_size(&self) -> u64 {
        self.sub_size.load(Ordering::Acquire)
    }

    pub fn set_sub_group_size(&self, size: u64) {
        self.sub_size.store(size, Ordering::Release);
    }

    /// Snapshot of the current validator handles.
    pub fn list(&self) -> Vec<Arc<WeightedValidator>> {
        self.core.read().validators.clone()
    }

    pub fn get_by_index(&self, index: u64) -> Option<Arc<WeightedValidator>> {
        self.core.read().validators.get(index as usize).cloned()
    }

    /// Position and handle of a validator, `None` if absent.
    pub fn get_by_address(&self, addr: Address) -> Option<(usize, Arc<WeightedValidator>)> {
        let core = self.core.read();
        lookup(&core.validators, addr)
    }

    /// Current round's proposer. Lock-free.
    pub fn get_proposer(&self) -> Option<Arc<WeightedValidator>> {
        self.proposer.load_full()
    }

    /// Whether `addr` resolves to a validator deep-equal to the
    /// current proposer.
    pub fn is_proposer(&self, addr: Address) -> bool {
        match (self.get_by_address(addr), self.get_proposer()) {
            (Some((_, val)), Some(proposer)) => val.deep_eq(&proposer),
            _ => false,
        }
    }

    /// Recompute the current proposer for `(last_proposer, round)` and
    /// publish it. Weighted selection first; if the proposer sequence
    /// is unusable, round-robin over the validators; if even those are
    /// gone, a synthetic one-shot validator built from `last_proposer`
    /// keeps the engine limping while operators intervene.
    pub fn calc_proposer(&self, last_proposer: Address, round: u64) {
        let core = self.core.read();

        let new_proposer =
            selector::weighted_random_proposer(&core, &self.params, last_proposer, round)
                .or_else(|| {
                    warn!(round, "weighted selection failed, falling back to round robin");
                    selector::round_robin_proposer(&core, last_proposer, round)
                })
                .unwrap_or_else(|| {
                    warn!(
                        %last_proposer,
                        "NO VALIDATOR! using the last proposer as a workaround"
                    );
                    WeightedValidator::new(last_proposer, Address::ZERO, 0, 0)
                });

        debug!(
            new = %new_proposer,
            %last_proposer,
            round,
            block_num = core.block_num,
            proposers_block_num = core.proposers_block_num,
            "update proposer"
        );
        self.proposer.store(Some(new_proposer));
    }

    /// Committee for `(prev_hash, view)` with the current proposer in
    /// slot 0.
    pub fn sub_list(&self, prev_hash: Hash, view: View) -> Vec<Arc<WeightedValidator>> {
        let proposer_addr = self
            .get_proposer()
            .map(|p| p.address())
            .unwrap_or(Address::ZERO);
        self.sub_list_with_proposer(prev_hash, proposer_addr, view)
    }

    /// Committee derivation with an explicit proposer.
    ///
    /// Slot 0 is the proposer, slot 1 the next distinct proposer the
    /// selector produces, the rest a seeded draw from the remaining
    /// validators. Falls back to the full list when the council is not
    /// larger than the committee target or the proposer is unknown.
    pub fn sub_list_with_proposer(
        &self,
        prev_hash: Hash,
        proposer_addr: Address,
        view: View,
    ) -> Vec<Arc<WeightedValidator>> {
        let core = self.core.read();
        let sub_size = self.sub_group_size();

        if core.validators.len() as u64 <= sub_size {
            return core.validators.clone();
        }

        let seed = prev_hash.seed60();

        let Some((proposer_idx, proposer)) = lookup(&core.validators, proposer_addr) else {
            warn!(
                %proposer_addr,
                "cannot derive a committee, proposer is not a council member"
            );
            return core.validators.clone();
        };

        let mut committee = Vec::with_capacity(sub_size as usize);
        committee.push(proposer);
        if sub_size == 1 {
            return committee;
        }

        // Slot 1: iterate the selector until it yields a different
        // address. Bounded so a degenerate sequence cannot spin; the
        // duplicate outcome is degraded but well-defined.
        let attempts = core.proposers.len().max(core.validators.len()) as u64;
        let mut next_proposer = None;
        for k in 1..=attempts {
            match selector::weighted_random_proposer(
                &core,
                &self.params,
                proposer_addr,
                view.round + k,
            ) {
                Some(candidate) if candidate.address() != proposer_addr => {
                    next_proposer = Some(candidate);
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
        let next_proposer = next_proposer.unwrap_or_else(|| {
            warn!(
                %proposer_addr,
                "no distinct next proposer, committee slot 1 duplicates slot 0"
            );
            committee[0].clone()
        });
        let next_idx = lookup(&core.validators, next_proposer.address())
            .map(|(i, _)| i)
            .unwrap_or(proposer_idx);
        committee.push(next_proposer);

        // Remaining slots: seeded draw over every other validator.
        let mut indices: Vec<usize> = (0..core.validators.len())
            .filter(|&i| i != proposer_idx && i != next_idx)
            .collect();
        let pick_size = indices.len();
        DeterministicRng::new(seed).shuffle(&mut indices);

        let remaining = (sub_size as usize - 2).min(pick_size);
        for &idx in indices.iter().take(remaining) {
            committee.push(core.validators[idx].clone());
        }

        trace!(
            block_num = core.block_num,
            %prev_hash,
            committee = committee.len(),
            sub_size,
            "new committee"
        );
        committee
    }

    /// Whether `addr` is in the committee for `(prev_hash, view)`.
    pub fn check_in_sub_list(&self, prev_hash: Hash, view: View, addr: Address) -> bool {
        self.sub_list(prev_hash, view)
            .iter()
            .any(|v| v.address() == addr)
    }

    /// Insert a validator with defaults. Returns `false` if already
    /// present. The proposer sequence is untouched until the next
    /// refresh.
    pub fn add_validator(&self, addr: Address) -> bool {
        let mut core = self.core.write();
        if lookup(&core.validators, addr).is_some() {
            return false;
        }
        core.validators.push(WeightedValidator::new(
            addr,
            Address::ZERO,
            DEFAULT_VOTING_POWER,
            0,
        ));
        core.validators.sort_by_key(|v| v.address());
        true
    }

    /// Remove a validator from both the validator list and the
    /// proposer sequence. Returns `false` if absent.
    pub fn remove_validator(&self, addr: Address) -> bool {
        let mut core = self.core.write();
        let Some((idx, _)) = lookup(&core.validators, addr) else {
            return false;
        };
        core.validators.remove(idx);
        core.proposers.retain(|p| p.address() != addr);
        true
    }

    /// Overwrite the validator list. Does not touch the proposer
    /// sequence.
    pub fn replace_validators(&self, mut validators: Vec<Arc<WeightedValidator>>) -> bool {
        validators.sort_by_key(|v| v.address());
        self.core.write().validators = validators;
        true
    }

    /// Recompute weights from staking and reshuffle the proposer
    /// sequence with a seed from `hash`.
    ///
    /// No-op when `block_num` was already refreshed. The staking
    /// snapshot is recorded even when refresh aborts for lack of one,
    /// so inspection always shows the latest observation.
    pub fn refresh(
        &self,
        hash: Hash,
        block_num: u64,
        staking: &dyn StakingSource,
    ) -> Result<(), CouncilError> {
        let mut core = self.core.write();

        if core.proposers_block_num == block_num {
            // already refreshed
            return Ok(());
        }
        if core.validators.is_empty() {
            return Err(CouncilError::NoValidator);
        }

        let seed = hash.seed60();
        let info = staking.staking_info_at(block_num + 1);
        core.staking_info = info.clone();
        let Some(mut info) = info else {
            return Err(CouncilError::SkipRefreshNoStakingInfo);
        };

        let mut amounts = collect_staking_amounts(&core.validators, &info);
        let total = calc_total_amount(&core.validators, &mut info, &mut amounts);
        calc_weights(&core.validators, &amounts, total);
        refresh_proposers(&mut core, seed, block_num);
        core.staking_info = Some(info);

        debug!(
            block_num,
            %hash,
            proposers = core.proposers.len(),
            "refresh done"
        );
        Ok(())
    }

    /// Deep structural copy: every validator is cloned, and the
    /// proposer sequence / current proposer are remapped onto the
    /// clones so the copy is fully detached from this council.
    pub fn copy(&self) -> Self {
        let core = self.core.read();

        let validators: Vec<Arc<WeightedValidator>> =
            core.validators.iter().map(|v| v.clone_detached()).collect();
        let by_addr: HashMap<Address, Arc<WeightedValidator>> = validators
            .iter()
            .map(|v| (v.address(), v.clone()))
            .collect();
        let remap = |v: &Arc<WeightedValidator>| {
            by_addr
                .get(&v.address())
                .cloned()
                .unwrap_or_else(|| v.clone_detached())
        };

        let proposers = core.proposers.iter().map(remap).collect();
        let proposer = self.proposer.load_full().map(|p| remap(&p));

        Self {
            sub_size: AtomicU64::new(self.sub_group_size()),
            policy: self.policy,
            params: self.params,
            proposer: ArcSwapOption::new(proposer),
            core: RwLock::new(CouncilCore {
                validators,
                proposers,
                proposers_block_num: core.proposers_block_num,
                staking_info: core.staking_info.clone(),
                block_num: core.block_num,
            }),
        }
    }

    /// Byzantine fault tolerance bound: `ceil(n / 3) - 1` where `n`
    /// is the effective committee size.
    pub fn f(&self) -> u64 {
        let n = self.size().min(self.sub_group_size());
        ((n + 2) / 3).saturating_sub(1)
    }

    /// Plain sum of per-validator voting powers.
    pub fn total_voting_power(&self) -> u64 {
        self.core
            .read()
            .validators
            .iter()
            .map(|v| v.voting_power())
            .sum()
    }

    /// Block this council is associated with.
    pub fn block_num(&self) -> u64 {
        self.core.read().block_num
    }

    /// Rebind the council to a block height.
    pub fn set_block_num(&self, block_num: u64) {
        self.core.write().block_num = block_num;
    }

    /// Block at which the proposer sequence was last refreshed.
    pub fn proposers_block_num(&self) -> u64 {
        self.core.read().proposers_block_num
    }

    /// Snapshot of the current proposer sequence.
    pub fn proposers(&self) -> Vec<Arc<WeightedValidator>> {
        self.core.read().proposers.clone()
    }

    /// Column-wise dump for snapshot persistence.
    pub fn council_data(&self) -> CouncilData {
        let core = self.core.read();
        CouncilData {
            validators: core.validators.iter().map(|v| v.address()).collect(),
            reward_addrs: core.validators.iter().map(|v| v.reward_address()).collect(),
            voting_powers: core.validators.iter().map(|v| v.voting_power()).collect(),
            weights: core.validators.iter().map(|v| v.weight()).collect(),
            proposers: core.proposers.iter().map(|p| p.address()).collect(),
            proposers_block_num: core.proposers_block_num,
        }
    }

    pub(crate) fn core_write(&self) -> parking_lot::RwLockWriteGuard<'_, CouncilCore> {
        self.core.write()
    }
}

fn lookup(
    validators: &[Arc<WeightedValidator>],
    addr: Address,
) -> Option<(usize, Arc<WeightedValidator>)> {
    validators
        .iter()
        .position(|v| v.address() == addr)
        .map(|i| (i, validators[i].clone()))
}

/// Per-validator staking amounts from a snapshot. Updates reward
/// addresses as a side effect: validators present in the snapshot take
/// its reward address, absent ones are cleared. Staking entries with
/// no council seat fold into the first validator sharing their reward
/// address.
fn collect_staking_amounts(
    validators: &[Arc<WeightedValidator>],
    info: &StakingInfo,
) -> Vec<f64> {
    let mut amounts = vec![0.0; validators.len()];
    let mut attributed = vec![false; info.council_node_addrs.len()];

    for (v_idx, val) in validators.iter().enumerate() {
        if let Some(s_idx) = info.index_by_node_address(val.address()) {
            val.set_reward_address(info.council_reward_addrs[s_idx]);
            amounts[v_idx] = info.council_staking_amounts[s_idx] as f64;
            attributed[s_idx] = true;
        } else {
            val.set_reward_address(Address::ZERO);
        }
    }

    for (s_idx, done) in attributed.iter().enumerate() {
        if *done {
            continue;
        }
        if let Some(v_idx) = validators
            .iter()
            .position(|v| v.reward_address() == info.council_reward_addrs[s_idx])
        {
            amounts[v_idx] += info.council_staking_amounts[s_idx] as f64;
        }
    }

    amounts
}

/// Total staking amount, Gini-compressed in place when the snapshot
/// asks for it. The computed coefficient is written back into the
/// snapshot.
fn calc_total_amount(
    validators: &[Arc<WeightedValidator>],
    info: &mut StakingInfo,
    amounts: &mut [f64],
) -> f64 {
    if info.council_node_addrs.is_empty() {
        return 0.0;
    }

    if info.use_gini {
        // The coefficient is measured only over validators the
        // snapshot actually covers, then applied to every amount.
        let measured: Vec<f64> = validators
            .iter()
            .enumerate()
            .filter(|(_, v)| info.index_by_node_address(v.address()).is_some())
            .map(|(i, _)| amounts[i])
            .collect();
        info.gini = gini_coefficient(&measured);

        let exponent = 1.0 / (1.0 + info.gini);
        let mut total = 0.0;
        for amount in amounts.iter_mut() {
            *amount = amount.powf(exponent).round();
            total += *amount;
        }
        total
    } else {
        amounts.iter().sum()
    }
}

/// Integer weights from normalized staking amounts. A validator with
/// nonzero stake never rounds below weight 1.
fn calc_weights(validators: &[Arc<WeightedValidator>], amounts: &[f64], total: f64) {
    if total > 0.0 {
        for (val, amount) in validators.iter().zip(amounts) {
            let mut weight = (amount * 100.0 / total).round() as u64;
            if weight == 0 && *amount > 0.0 {
                weight = 1;
            }
            val.store_weight(weight);
        }
    } else {
        for val in validators {
            val.store_weight(0);
        }
    }
    debug!("weight calculation finished");
}

/// Rebuild the proposer multiset (each validator `weight` times, or
/// once each if every weight is zero) and shuffle it with `seed`.
fn refresh_proposers(core: &mut CouncilCore, seed: i64, block_num: u64) {
    let mut candidate_idx: Vec<usize> = Vec::new();
    for (idx, val) in core.validators.iter().enumerate() {
        for _ in 0..val.weight() {
            candidate_idx.push(idx);
        }
    }
    if candidate_idx.is_empty() {
        // All weights zero: every validator proposes once.
        candidate_idx.extend(0..core.validators.len());
        trace!("all weights are zero, using every validator as a candidate proposer");
    }

    DeterministicRng::new(seed).shuffle(&mut candidate_idx);

    core.proposers = candidate_idx
        .iter()
        .map(|&idx| core.validators[idx].clone())
        .collect();
    core.proposers_block_num = block_num;
}
