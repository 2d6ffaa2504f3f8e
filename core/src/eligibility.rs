//! Rep eligibility per family.
//!
//! RULES:
//!   - Only assignable reps (active, included, not departing) take work.
//!   - Strategic families go to strategic reps and nobody else; strategic
//!     reps take nothing but strategic families. With no strategic reps on
//!     the roster the pool collapses and strategic families are balanced
//!     with everything else (StrategicPoolEmpty).
//!   - Renewal specialists only take customers at or under the routing
//!     ARR ceiling. When that leaves a family with no candidate, the
//!     restriction is dropped for that family rather than stranding it.

use crate::{
    config::{BalanceScope, RoutingConfig},
    error::{AssignError, AssignResult},
    event::{RunWarning, WarningLog},
    model::Book,
    stability::LockSet,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pool {
    General,
    Strategic,
}

impl Pool {
    pub fn label(&self) -> &'static str {
        match self {
            Pool::General   => "general",
            Pool::Strategic => "strategic",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Eligibility {
    /// Family positions (into `book.families`) in scope for this run.
    in_scope: Vec<usize>,
    /// Eligible reps per family position; empty for out-of-scope families.
    per_family: Vec<Vec<usize>>,
    pool_of: Vec<Pool>,
    general_reps: Vec<usize>,
    strategic_reps: Vec<usize>,
    family_of_head: HashMap<usize, usize>,
}

fn specialist_allows(book: &Book, head: usize, routing: &RoutingConfig) -> bool {
    let acct = &book.accounts[head];
    acct.is_customer && acct.balance_arr() <= routing.renewal_specialist_max_arr
}

impl Eligibility {
    pub fn build(
        book: &Book,
        scope: BalanceScope,
        routing: &RoutingConfig,
        warnings: &mut WarningLog,
    ) -> AssignResult<Self> {
        let assignable: Vec<usize> = (0..book.reps.len())
            .filter(|&r| book.reps[r].is_assignable())
            .collect();
        let strategic_reps: Vec<usize> = assignable
            .iter()
            .copied()
            .filter(|&r| book.reps[r].is_strategic)
            .collect();
        let pool_active = !strategic_reps.is_empty();
        let general_reps: Vec<usize> = assignable
            .iter()
            .copied()
            .filter(|&r| !book.reps[r].is_strategic)
            .collect();

        let in_scope: Vec<usize> = book
            .families
            .iter()
            .enumerate()
            .filter(|(_, f)| scope.includes(book.accounts[f.head].is_customer))
            .map(|(i, _)| i)
            .collect();

        let strategic_count = in_scope
            .iter()
            .filter(|&&f| book.accounts[book.families[f].head].is_strategic)
            .count();
        if strategic_count > 0 && !pool_active {
            warnings.push(RunWarning::StrategicPoolEmpty { strategic_accounts: strategic_count });
        }

        let mut per_family = vec![Vec::new(); book.families.len()];
        let mut pool_of = vec![Pool::General; book.families.len()];
        for &f in &in_scope {
            let head = book.families[f].head;
            let pool = if pool_active && book.accounts[head].is_strategic {
                Pool::Strategic
            } else {
                Pool::General
            };
            let candidates = match pool {
                Pool::General => &general_reps,
                Pool::Strategic => &strategic_reps,
            };
            if candidates.is_empty() {
                return Err(AssignError::NoEligibleReps {
                    scope: format!("{} {}", scope.label(), pool.label()),
                });
            }
            let routed: Vec<usize> = candidates
                .iter()
                .copied()
                .filter(|&r| !book.reps[r].is_renewal_specialist || specialist_allows(book, head, routing))
                .collect();
            per_family[f] = if routed.is_empty() { candidates.clone() } else { routed };
            pool_of[f] = pool;
        }

        let family_of_head = book.families.iter().enumerate().map(|(i, f)| (f.head, i)).collect();

        log::debug!(
            "eligibility: {} families in scope, {} general reps, {} strategic reps",
            in_scope.len(),
            general_reps.len(),
            strategic_reps.len(),
        );
        Ok(Self { in_scope, per_family, pool_of, general_reps, strategic_reps, family_of_head })
    }

    /// Drop locks whose required rep sits in the other pool.
    /// Strategic isolation outranks stability.
    pub fn reconcile_locks(&self, book: &Book, locks: &mut LockSet, warnings: &mut WarningLog) {
        let conflicting: Vec<(usize, usize)> = locks
            .iter()
            .filter_map(|lock| {
                let f = *self.family_of_head.get(&lock.account)?;
                if !self.is_in_scope(f) {
                    return None;
                }
                let rep_pool = if book.reps[lock.required_rep].is_strategic && self.strategic_active() {
                    Pool::Strategic
                } else {
                    Pool::General
                };
                (rep_pool != self.pool_of[f]).then_some((lock.account, lock.required_rep))
            })
            .collect();
        for (head, rep) in conflicting {
            locks.release(head);
            warnings.push(RunWarning::LockConflictsWithStrategic {
                account_id: book.accounts[head].id.clone(),
                rep_id: book.reps[rep].id.clone(),
            });
        }
    }

    pub fn in_scope(&self) -> &[usize] {
        &self.in_scope
    }

    pub fn is_in_scope(&self, family: usize) -> bool {
        !self.per_family[family].is_empty()
    }

    pub fn eligible(&self, family: usize) -> &[usize] {
        &self.per_family[family]
    }

    pub fn is_eligible(&self, family: usize, rep: usize) -> bool {
        self.per_family[family].binary_search(&rep).is_ok()
    }

    pub fn pool(&self, family: usize) -> Pool {
        self.pool_of[family]
    }

    pub fn family_of_head(&self, head: usize) -> Option<usize> {
        self.family_of_head.get(&head).copied()
    }

    pub fn strategic_active(&self) -> bool {
        !self.strategic_reps.is_empty()
    }

    pub fn reps(&self, pool: Pool) -> &[usize] {
        match pool {
            Pool::General => &self.general_reps,
            Pool::Strategic => &self.strategic_reps,
        }
    }

    pub fn rep_pool(&self, book: &Book, rep: usize) -> Pool {
        if self.strategic_active() && book.reps[rep].is_strategic {
            Pool::Strategic
        } else {
            Pool::General
        }
    }

    /// In-scope families belonging to one pool, in family order.
    pub fn families_in(&self, pool: Pool) -> impl Iterator<Item = usize> + '_ {
        self.in_scope.iter().copied().filter(move |&f| self.pool_of[f] == pool)
    }
}
