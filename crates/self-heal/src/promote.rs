//! Profile rewrite for one promotion

use resel_core_types::{SelectorCandidate, SelectorProfile, SelectorStrategy, Stability};

/// Build the successor of `profile` with `strategy` as primary.
///
/// The old primary joins the fallbacks, which are re-ranked and capped at
/// `max_fallbacks`; the old primary is never the one dropped by the cap.
/// Returns `None` when `strategy` is already primary or is not a fallback.
pub fn promote(
    profile: &SelectorProfile,
    strategy: SelectorStrategy,
    max_fallbacks: usize,
) -> Option<SelectorProfile> {
    if profile.primary.strategy == strategy {
        return None;
    }
    let position = profile
        .fallbacks
        .iter()
        .position(|candidate| candidate.strategy == strategy)?;

    let mut fallbacks = profile.fallbacks.clone();
    let promoted = fallbacks.remove(position);
    let demoted = profile.primary.strategy;
    fallbacks.push(profile.primary.clone());
    fallbacks.sort_by(SelectorCandidate::rank_cmp);
    while fallbacks.len() > max_fallbacks {
        match fallbacks
            .iter()
            .rposition(|candidate| candidate.strategy != demoted)
        {
            Some(last) => {
                fallbacks.remove(last);
            }
            None => break,
        }
    }

    Some(SelectorProfile {
        logical_id: profile.logical_id.clone(),
        platform: profile.platform,
        stability: Stability::from_priority(promoted.base_priority),
        primary: promoted,
        fallbacks,
        version: profile.version + 1,
        owning_artifact: profile.owning_artifact.clone(),
    })
}
