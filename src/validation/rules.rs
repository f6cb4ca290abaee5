//! Header validation rule chain
//!
//! Rules are independent checks applied in order; each network's
//! parameters select which difficulty rule runs at adjustment heights.
//! The legacy rule recomputes the 2016-block retarget; Bitcoin-Cash
//! style networks substitute a rolling-window rule instead.

use primitive_types::U256;

use crate::core::{AdjustmentRule, Block, BlockHeader, NetworkParams};
use crate::validation::difficulty::{decode_compact, encode_compact};
use crate::validation::{BlockLookup, ValidationError};

/// Rolling-window adjustment looks this many blocks back
const ROLLING_WINDOW: u64 = 144;

/// Everything a rule may consult about the candidate
pub struct RuleContext<'a> {
    pub candidate: &'a Block,
    pub candidate_header: &'a BlockHeader,
    pub previous: &'a Block,
    pub previous_header: &'a BlockHeader,
    pub params: &'a NetworkParams,
    pub lookup: &'a dyn BlockLookup,
}

/// A single independent header check
pub trait HeaderRule: Send + Sync {
    fn check(&self, ctx: &RuleContext<'_>) -> Result<(), ValidationError>;
}

/// The candidate's previous-hash field must name the previous block
pub struct ContinuityRule;

impl HeaderRule for ContinuityRule {
    fn check(&self, ctx: &RuleContext<'_>) -> Result<(), ValidationError> {
        if ctx.candidate_header.previous_hash != ctx.previous.header_hash {
            return Err(ValidationError::InvalidChain);
        }
        Ok(())
    }
}

/// Between adjustments the target must not move
pub struct EqualBitsRule;

impl HeaderRule for EqualBitsRule {
    fn check(&self, ctx: &RuleContext<'_>) -> Result<(), ValidationError> {
        if ctx.candidate_header.bits != ctx.previous_header.bits {
            return Err(ValidationError::NotEqualBits);
        }
        Ok(())
    }
}

/// Legacy 2016-block retarget: the new target is the old target scaled
/// by the actual epoch timespan, clamped to a factor of four either way
/// and capped at the network maximum.
pub struct LegacyAdjustmentRule;

impl HeaderRule for LegacyAdjustmentRule {
    fn check(&self, ctx: &RuleContext<'_>) -> Result<(), ValidationError> {
        let reference = ctx
            .lookup
            .block_back(ctx.previous, ctx.params.height_interval - 1)
            .ok_or(ValidationError::NoPreviousBlock)?;
        let reference_header = reference.header.as_ref().ok_or(ValidationError::NoHeader)?;

        let target_timespan = ctx.params.target_timespan as u64;
        let actual = (ctx.previous_header.timestamp as u64)
            .saturating_sub(reference_header.timestamp as u64)
            .clamp(target_timespan / 4, target_timespan * 4);

        let expected_bits = retargeted_bits(
            ctx.previous_header.bits,
            actual,
            target_timespan,
            ctx.params.max_target_bits,
        );

        if ctx.candidate_header.bits != expected_bits {
            return Err(ValidationError::NotDifficultyTransitionEqualBits);
        }
        Ok(())
    }
}

/// Rolling-window adjustment (Bitcoin-Cash style): the target tracks the
/// timespan over the last 144 blocks, clamped to a factor of two.
pub struct RollingWindowRule;

impl HeaderRule for RollingWindowRule {
    fn check(&self, ctx: &RuleContext<'_>) -> Result<(), ValidationError> {
        let reference = ctx
            .lookup
            .block_back(ctx.previous, ROLLING_WINDOW)
            .ok_or(ValidationError::NoPreviousBlock)?;
        let reference_header = reference.header.as_ref().ok_or(ValidationError::NoHeader)?;

        let expected = ROLLING_WINDOW * ctx.params.target_spacing as u64;
        let actual = (ctx.previous_header.timestamp as u64)
            .saturating_sub(reference_header.timestamp as u64)
            .clamp(expected / 2, expected * 2);

        let expected_bits = retargeted_bits(
            ctx.previous_header.bits,
            actual,
            expected,
            ctx.params.max_target_bits,
        );

        if ctx.candidate_header.bits != expected_bits {
            return Err(ValidationError::NotDifficultyTransitionEqualBits);
        }
        Ok(())
    }
}

/// Scale the previous target by actual/expected timespan and cap it
fn retargeted_bits(previous_bits: u32, actual: u64, expected: u64, max_bits: u32) -> u32 {
    let old_target = decode_compact(previous_bits);
    let mut new_target = old_target * U256::from(actual) / U256::from(expected);
    let max_target = decode_compact(max_bits);
    if new_target > max_target {
        new_target = max_target;
    }
    encode_compact(new_target)
}

/// Network-configured chain of header rules
pub struct HeaderChainValidator {
    params: NetworkParams,
}

impl HeaderChainValidator {
    pub fn new(params: NetworkParams) -> Self {
        Self { params }
    }

    /// Validate a candidate against its predecessor. The first failing
    /// rule short-circuits with its error.
    pub fn validate(
        &self,
        candidate: &Block,
        previous: &Block,
        lookup: &dyn BlockLookup,
    ) -> Result<(), ValidationError> {
        let candidate_header = candidate.header.as_ref().ok_or(ValidationError::NoHeader)?;

        // A candidate matching the hard-coded checkpoint is trusted as-is
        if let Some(checkpoint) = &self.params.checkpoint {
            if candidate.height == checkpoint.height && *candidate_header == checkpoint.header {
                return Ok(());
            }
        }

        let previous_header = previous.header.as_ref().ok_or(ValidationError::NoHeader)?;

        let ctx = RuleContext {
            candidate,
            candidate_header,
            previous,
            previous_header,
            params: &self.params,
            lookup,
        };

        for rule in self.rules_for_height(candidate.height) {
            rule.check(&ctx)?;
        }
        Ok(())
    }

    fn rules_for_height(&self, height: u64) -> Vec<Box<dyn HeaderRule>> {
        let difficulty_rule: Box<dyn HeaderRule> =
            if height % self.params.height_interval == 0 {
                match self.params.adjustment {
                    AdjustmentRule::Legacy => Box::new(LegacyAdjustmentRule),
                    AdjustmentRule::RollingWindow => Box::new(RollingWindowRule),
                }
            } else {
                Box::new(EqualBitsRule)
            };
        vec![Box::new(ContinuityRule), difficulty_rule]
    }
}
