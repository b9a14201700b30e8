//! Hand-off of advisory texts to an external translation layer

use crate::models::AdvisoryBundle;
use std::collections::BTreeMap;

/// Translates domain → text maps into a target language.
///
/// Implementations may drop or leave entries unchanged; callers keep the
/// source text for anything not returned.
pub trait Translator: Send + Sync {
    fn translate(
        &self,
        texts: &BTreeMap<String, String>,
        language: &str,
    ) -> anyhow::Result<BTreeMap<String, String>>;
}

/// Returns its input unchanged
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    fn translate(
        &self,
        texts: &BTreeMap<String, String>,
        _language: &str,
    ) -> anyhow::Result<BTreeMap<String, String>> {
        Ok(texts.clone())
    }
}

impl AdvisoryBundle {
    pub fn to_domain_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::from([
            ("irrigation".to_string(), self.irrigation.clone()),
            ("fertilizer".to_string(), self.fertilizer.clone()),
            ("pest".to_string(), self.pest.clone()),
            ("general".to_string(), self.general.clone()),
        ]);
        if let Some(d) = &self.disclaimer {
            map.insert("disclaimer".to_string(), d.clone());
        }
        map
    }

    /// Overwrite texts with translated entries; absent or blank entries keep the original
    pub fn apply_domain_map(&mut self, translated: &BTreeMap<String, String>) {
        let pick = |key: &str, current: &mut String| {
            if let Some(text) = translated.get(key).filter(|t| !t.trim().is_empty()) {
                *current = text.clone();
            }
        };
        pick("irrigation", &mut self.irrigation);
        pick("fertilizer", &mut self.fertilizer);
        pick("pest", &mut self.pest);
        pick("general", &mut self.general);
        if let Some(d) = self.disclaimer.as_mut() {
            pick("disclaimer", d);
        }
    }

    /// Translate through `translator`, keeping the source text on failure
    pub fn translated(&self, translator: &dyn Translator, language: &str) -> AdvisoryBundle {
        let mut out = self.clone();
        match translator.translate(&self.to_domain_map(), language) {
            Ok(map) => out.apply_domain_map(&map),
            Err(e) => tracing::warn!(
                language = %language,
                error = %e,
                "Translation failed, keeping source text"
            ),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> AdvisoryBundle {
        AdvisoryBundle {
            irrigation: "irrigate".to_string(),
            fertilizer: "fertilize".to_string(),
            pest: "scout".to_string(),
            general: "plan".to_string(),
            disclaimer: None,
            based_on_features: vec![],
            confidence: 0.8,
        }
    }

    struct PartialUpper;

    impl Translator for PartialUpper {
        fn translate(
            &self,
            texts: &BTreeMap<String, String>,
            _language: &str,
        ) -> anyhow::Result<BTreeMap<String, String>> {
            Ok(texts
                .iter()
                .filter(|(k, _)| k.as_str() != "pest")
                .map(|(k, v)| (k.clone(), v.to_uppercase()))
                .collect())
        }
    }

    struct Failing;

    impl Translator for Failing {
        fn translate(
            &self,
            _texts: &BTreeMap<String, String>,
            _language: &str,
        ) -> anyhow::Result<BTreeMap<String, String>> {
            anyhow::bail!("service unavailable")
        }
    }

    #[test]
    fn test_identity_round_trip() {
        let b = bundle();
        assert_eq!(b.translated(&IdentityTranslator, "or"), b);
        assert!(!b.to_domain_map().contains_key("disclaimer"));
    }

    #[test]
    fn test_missing_entries_keep_source() {
        let t = bundle().translated(&PartialUpper, "hi");
        assert_eq!(t.irrigation, "IRRIGATE");
        assert_eq!(t.pest, "scout");
    }

    #[test]
    fn test_failure_keeps_source() {
        let b = bundle();
        assert_eq!(b.translated(&Failing, "hi"), b);
    }
}
