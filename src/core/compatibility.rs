//! Mutual orientation compatibility.
//!
//! A candidate is eligible for a caller when the caller is attracted to the
//! candidate's gender *and* the candidate's orientation includes the caller's
//! gender. The rule is resolved once per request into a list of
//! [`CompatibilityClause`]s, OR-ed together by the store.

use std::collections::BTreeSet;

use crate::models::{Gender, Orientation, Profile};

impl Orientation {
    /// Normalise free-text orientation.
    ///
    /// Lower-cased and trimmed, then matched by exact phrase, then by suffix.
    /// Anything unrecognised falls back to [`Orientation::LikesBoth`].
    pub fn normalize(value: &str) -> Orientation {
        let lower = value.trim().to_lowercase();

        match lower.as_str() {
            "likes men and women" | "likes both" | "both" => return Orientation::LikesBoth,
            "likes men" | "men" => return Orientation::LikesMen,
            "likes women" | "women" => return Orientation::LikesWomen,
            _ => {}
        }

        // "women" ends with "men", so it has to be tested first
        if lower.ends_with("men and women") {
            Orientation::LikesBoth
        } else if lower.ends_with("women") {
            Orientation::LikesWomen
        } else if lower.ends_with("men") {
            Orientation::LikesMen
        } else {
            Orientation::LikesBoth
        }
    }

    /// Genders this orientation is attracted to
    pub fn attracted_to(&self) -> &'static [Gender] {
        match self {
            Orientation::LikesMen => &[Gender::Man],
            Orientation::LikesWomen => &[Gender::Woman],
            Orientation::LikesBoth => &[Gender::Man, Gender::Woman],
        }
    }

    pub fn accepts(&self, gender: Gender) -> bool {
        self.attracted_to().contains(&gender)
    }

    /// Every orientation that includes `gender`
    pub fn accepting(gender: Gender) -> Vec<Orientation> {
        [Orientation::LikesMen, Orientation::LikesWomen, Orientation::LikesBoth]
            .into_iter()
            .filter(|o| o.accepts(gender))
            .collect()
    }
}

/// One arm of the eligibility predicate:
/// `candidate.gender == gender AND candidate.orientation IN accepted_orientations`
#[derive(Debug, Clone, PartialEq)]
pub struct CompatibilityClause {
    pub gender: Gender,
    pub accepted_orientations: Vec<Orientation>,
}

impl CompatibilityClause {
    pub fn matches(&self, candidate: &Profile) -> bool {
        candidate.gender == Some(self.gender)
            && candidate
                .orientation
                .is_some_and(|o| self.accepted_orientations.contains(&o))
    }
}

/// Orientation used for a caller who never set one
pub fn effective_orientation(profile: &Profile) -> Orientation {
    profile.orientation.unwrap_or(Orientation::LikesBoth)
}

/// Genders the caller is looking for
pub fn target_genders(orientation: Orientation) -> BTreeSet<Gender> {
    orientation.attracted_to().iter().copied().collect()
}

/// Resolve the caller's mutual-acceptance clauses.
///
/// A caller without a gender resolves no clause: no candidate can be checked
/// for accepting them, so the eligible set is empty.
pub fn resolve_clauses(caller_gender: Option<Gender>, caller_orientation: Orientation) -> Vec<CompatibilityClause> {
    let Some(caller_gender) = caller_gender else {
        return Vec::new();
    };

    target_genders(caller_orientation)
        .into_iter()
        .map(|gender| CompatibilityClause {
            gender,
            accepted_orientations: Orientation::accepting(caller_gender),
        })
        .collect()
}

/// Whether `candidate` and `caller` are each attracted to the other's gender
pub fn is_mutually_compatible(caller: &Profile, candidate: &Profile) -> bool {
    resolve_clauses(caller.gender, effective_orientation(caller))
        .iter()
        .any(|clause| clause.matches(candidate))
}
