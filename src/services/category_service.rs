//! Category Service
//!
//! Maps a free-text job description to a service category. The hosted
//! assistant is asked first; when it is unconfigured or fails, a keyword
//! table keeps the marketplace usable offline.

use crate::external::types::CategorySuggestion;
use crate::state::AppState;
use regex::RegexBuilder;
use tracing::debug;

/// Keyword patterns per category, with default price bands in PLN.
/// Word stems, so inflected forms match too.
const KEYWORD_TABLE: &[(&str, &str, f64, f64)] = &[
    ("Hydraulik", r"kran|rur|cieknie|przeciek|zlew|odplyw|odpływ|syfon|splucz|spłucz", 100.0, 400.0),
    ("Elektryk", r"prad|prąd|gniazdk|kontakt|bezpiecznik|instalacj.{0,3}elektry|lamp|zwarci", 80.0, 350.0),
    ("Malarz", r"malow|farb|scian|ścian|tapet|gladz|gładz", 200.0, 1500.0),
    ("Stolarz", r"mebl|szaf|drzwi|polk|półk|drewn|blat", 150.0, 800.0),
    ("Sprzatanie", r"sprzat|sprząt|czyszczeni|myci|pranie dywan", 80.0, 300.0),
    ("Ogrodnik", r"ogrod|ogród|trawnik|zywoplot|żywopłot|drzew|kosz?eni", 100.0, 500.0),
];

const DEFAULT_CATEGORY: &str = "Zlota raczka";

/// Category service for business logic
pub struct CategoryService;

impl CategoryService {
    /// Suggest a category for a job description.
    ///
    /// Never fails: assistant errors degrade to the keyword fallback, and
    /// unmatched text lands in the handyman category with low confidence.
    pub async fn suggest(state: &AppState, description: &str) -> crate::error::Result<CategorySuggestion> {
        match state.external.categorizer.categorize(description).await {
            Ok(suggestion) => Ok(suggestion),
            Err(e) => {
                debug!("Assistant categorization unavailable ({}), using keywords", e);
                Ok(keyword_suggestion(description))
            }
        }
    }
}

fn keyword_suggestion(description: &str) -> CategorySuggestion {
    for (category, pattern, price_min, price_max) in KEYWORD_TABLE {
        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .expect("keyword pattern is valid");
        if re.is_match(description) {
            return CategorySuggestion {
                category: category.to_string(),
                price_min: *price_min,
                price_max: *price_max,
                urgency: "normal".to_string(),
                confidence: 0.5,
            };
        }
    }
    CategorySuggestion {
        category: DEFAULT_CATEGORY.to_string(),
        price_min: 80.0,
        price_max: 300.0,
        urgency: "normal".to_string(),
        confidence: 0.2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_matches() {
        assert_eq!(keyword_suggestion("Cieknie kran w kuchni").category, "Hydraulik");
        assert_eq!(keyword_suggestion("Nie dziala gniazdko w sypialni").category, "Elektryk");
        assert_eq!(keyword_suggestion("Malowanie mieszkania 50m2").category, "Malarz");
        assert_eq!(keyword_suggestion("Przycinanie zywoplotu").category, "Ogrodnik");
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        assert_eq!(keyword_suggestion("CIEKNIE KRAN").category, "Hydraulik");
    }

    #[test]
    fn test_unmatched_text_falls_back_to_handyman() {
        let suggestion = keyword_suggestion("Potrzebuje pomocy z czyms dziwnym");
        assert_eq!(suggestion.category, "Zlota raczka");
        assert!(suggestion.confidence < 0.5);
    }
}
