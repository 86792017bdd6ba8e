/// Case-insensitive substring matcher over the configured safety terms.
#[derive(Debug, Clone)]
pub struct SafetyClassifier {
    /// (configured spelling, lower-cased needle)
    terms: Vec<(String, String)>,
}

impl SafetyClassifier {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|term| term.as_ref().trim().to_string())
            .filter(|term| !term.is_empty())
            .map(|term| {
                let needle = term.to_lowercase();
                (term, needle)
            })
            .collect();
        Self { terms }
    }

    /// Every term found in the title or abstract, in configured order.
    pub fn matches(&self, title: &str, abstract_text: Option<&str>) -> Vec<String> {
        let title = title.to_lowercase();
        let abstract_text = abstract_text.unwrap_or("").to_lowercase();
        self.terms
            .iter()
            .filter(|(_, needle)| title.contains(needle) || abstract_text.contains(needle))
            .map(|(term, _)| term.clone())
            .collect()
    }

    pub fn is_safety_paper(&self, title: &str, abstract_text: Option<&str>) -> bool {
        let title = title.to_lowercase();
        let abstract_text = abstract_text.unwrap_or("").to_lowercase();
        self.terms
            .iter()
            .any(|(_, needle)| title.contains(needle) || abstract_text.contains(needle))
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|(term, _)| term.as_str())
    }
}
