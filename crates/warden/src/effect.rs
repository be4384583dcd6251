use warden_core::{Decision, Effect, EffectKind, MatchResult};

// ---------------------------------------------------------------------------
// Effector — combines per-rule match results into one decision
// ---------------------------------------------------------------------------

/// Aggregates an ordered sequence of per-rule results under the model's
/// effect kind.
#[derive(Debug, Clone, Copy)]
pub struct Effector {
    kind: EffectKind,
}

impl Effector {
    pub fn new(kind: EffectKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    /// Starts a short-circuiting accumulation.
    pub fn stream(&self) -> EffectorStream {
        EffectorStream::new(self.kind)
    }

    /// Batch form of [`Effector::stream`]: feeds every result in order,
    /// then finalizes.
    pub fn merge(&self, results: &[MatchResult]) -> Decision {
        let mut stream = self.stream();
        for result in results {
            if stream.push(result.matched, result.effect) {
                break;
            }
        }
        stream.finish()
    }
}

// ---------------------------------------------------------------------------
// EffectorStream — ordered, short-circuiting accumulator
// ---------------------------------------------------------------------------

/// Ordered accumulator over per-rule results.
///
/// `push` reports once the decision can no longer change, so the caller can
/// stop evaluating further rules. Unmatched rules never contribute.
#[derive(Debug)]
pub struct EffectorStream {
    kind: EffectKind,
    index: usize,
    decided: Option<Decision>,
    allow_index: Option<usize>,
}

impl EffectorStream {
    fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            index: 0,
            decided: None,
            allow_index: None,
        }
    }

    /// Feeds the next rule's result, in rule order. Returns true when the
    /// final decision is already determined.
    pub fn push(&mut self, matched: bool, effect: Effect) -> bool {
        if self.decided.is_some() {
            return true;
        }
        let index = self.index;
        self.index += 1;
        if !matched {
            return false;
        }

        match self.kind {
            EffectKind::AllowOverride => {
                if effect == Effect::Allow {
                    self.decided = Some(Decision {
                        allowed: true,
                        rule_index: Some(index),
                        indeterminate: false,
                    });
                }
            }
            EffectKind::DenyGuard | EffectKind::AllowAndDeny => match effect {
                Effect::Deny => {
                    self.decided = Some(Decision {
                        allowed: false,
                        rule_index: Some(index),
                        indeterminate: false,
                    });
                }
                Effect::Allow => {
                    if self.allow_index.is_none() {
                        self.allow_index = Some(index);
                    }
                }
                Effect::Indeterminate => {}
            },
            EffectKind::Priority => {
                self.decided = Some(match effect {
                    Effect::Allow => Decision {
                        allowed: true,
                        rule_index: Some(index),
                        indeterminate: false,
                    },
                    Effect::Deny => Decision {
                        allowed: false,
                        rule_index: Some(index),
                        indeterminate: false,
                    },
                    Effect::Indeterminate => Decision {
                        allowed: false,
                        rule_index: Some(index),
                        indeterminate: true,
                    },
                });
            }
        }
        self.decided.is_some()
    }

    /// Finalizes the aggregation over everything pushed so far.
    ///
    /// An empty stream resolves by the kind's own semantics: allow-override
    /// and priority deny, the deny-guard allows.
    pub fn finish(self) -> Decision {
        if let Some(decision) = self.decided {
            return decision;
        }
        match self.kind {
            EffectKind::AllowOverride | EffectKind::Priority => Decision::deny(),
            EffectKind::DenyGuard => Decision::allow(),
            EffectKind::AllowAndDeny => match self.allow_index {
                Some(index) => Decision {
                    allowed: true,
                    rule_index: Some(index),
                    indeterminate: false,
                },
                None => Decision::deny(),
            },
        }
    }
}
