//! Attribute tracking hook.
//!
//! Runs after empty values are dropped and before power-set expansion, so a
//! removed attribute never appears in any derived key.

use std::collections::BTreeSet;

use crate::domain::attributes::AttributeSet;

use super::keys::canonical_name;

/// Narrows the attributes a variation is cached under.
pub trait TrackedAttributes: Send + Sync {
    fn tracked(&self, attributes: AttributeSet) -> AttributeSet;
}

impl<F> TrackedAttributes for F
where
    F: Fn(AttributeSet) -> AttributeSet + Send + Sync,
{
    fn tracked(&self, attributes: AttributeSet) -> AttributeSet {
        self(attributes)
    }
}

/// Tracks every attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllAttributes;

impl TrackedAttributes for AllAttributes {
    fn tracked(&self, attributes: AttributeSet) -> AttributeSet {
        attributes
    }
}

/// Drops a configured list of attribute names.
///
/// Names match either the raw attribute name (`attribute_pa_brand`) or the name
/// keys are spelled with (`pa_brand`).
#[derive(Debug, Clone, Default)]
pub struct UntrackedAttributes {
    names: BTreeSet<String>,
}

impl UntrackedAttributes {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names
                .into_iter()
                .map(Into::into)
                .filter(|name: &String| !name.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn excludes(&self, name: &str) -> bool {
        self.names.contains(name) || self.names.contains(canonical_name(name))
    }
}

impl TrackedAttributes for UntrackedAttributes {
    fn tracked(&self, mut attributes: AttributeSet) -> AttributeSet {
        if !self.names.is_empty() {
            attributes.retain(|name, _| !self.excludes(name));
        }
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AttributeSet {
        [
            ("attribute_pa_size", "M"),
            ("attribute_pa_color", "Red"),
            ("attribute_pa_brand", "Acme"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn all_attributes_is_identity() {
        assert_eq!(AllAttributes.tracked(sample()), sample());
    }

    #[test]
    fn untracked_matches_raw_and_bare_names() {
        let hook = UntrackedAttributes::new(["pa_brand", "attribute_pa_color"]);
        let tracked = hook.tracked(sample());
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked.get("attribute_pa_size"), Some("M"));
    }

    #[test]
    fn only_a_leading_namespace_token_is_stripped() {
        let hook = UntrackedAttributes::new(["pa_size"]);
        let attrs: AttributeSet = [("attribute_pa_size", "M"), ("pa_attribute_size", "L")]
            .into_iter()
            .collect();
        let tracked = hook.tracked(attrs);
        assert_eq!(tracked.len(), 1);
        assert!(tracked.contains("pa_attribute_size"));
    }

    #[test]
    fn empty_names_are_ignored() {
        let hook = UntrackedAttributes::new([""]);
        assert!(hook.is_empty());
        assert_eq!(hook.tracked(sample()).len(), 3);
    }

    #[test]
    fn closures_act_as_hooks() {
        let hook = |mut attrs: AttributeSet| {
            attrs.remove("attribute_pa_size");
            attrs
        };
        assert_eq!(hook.tracked(sample()).len(), 2);
    }
}
