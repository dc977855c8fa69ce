// Best-effort extraction of structured fields from free-form diagnoses
//
// Deterministic keyword rules only: the same text always yields the same
// details. Anything not found stays "unknown" / 0.0.

use regex::Regex;

use super::models::{Details, Severity, UNKNOWN};

/// Known disease names, first match in this order wins
const DISEASE_KEYWORDS: &[&str] = &[
    "稻瘟病",
    "纹枯病",
    "白叶枯病",
    "锈病",
    "赤霉病",
    "大斑病",
    "霜霉病",
    "白粉病",
];

/// English names, matched case-insensitively after the Chinese list
const DISEASE_KEYWORDS_EN: &[&str] = &[
    "rice blast",
    "sheath blight",
    "bacterial leaf blight",
    "fusarium head blight",
    "northern leaf blight",
    "downy mildew",
    "powdery mildew",
    "rust",
];

/// Checked in priority order: severe before moderate before mild
const SEVERITY_MARKERS: &[(Severity, &[&str])] = &[
    (Severity::Severe, &["严重", "重度", "severe"]),
    (Severity::Moderate, &["中等", "中度", "moderate"]),
    (Severity::Mild, &["轻微", "轻度", "mild"]),
];

/// Heading word that contains "严重" but names the field, not a level
const SEVERITY_HEADING: &str = "严重程度";

lazy_static::lazy_static! {
    static ref CONFIDENCE_RE: Regex = Regex::new(r"(\d+[.．]?\d*)\s*[%％]").unwrap();
    static ref SYMPTOMS_RE: Regex = Regex::new(r"症状描述[*\s]*[：:][*\s]*([^\n]+)").unwrap();
    static ref SOLUTION_RE: Regex =
        Regex::new(r"(?:防治建议|建议措施)[*\s]*[：:][*\s]*([^\n]+)").unwrap();
}

/// Populate a details record from diagnostic text
pub fn extract_details(text: &str) -> Details {
    Details {
        disease: extract_disease(text).unwrap_or(UNKNOWN).to_string(),
        severity: extract_severity(text),
        confidence: extract_confidence(text).unwrap_or(0.0),
        solution: labelled_line(&SOLUTION_RE, text).unwrap_or_else(|| UNKNOWN.to_string()),
        symptoms: labelled_line(&SYMPTOMS_RE, text).unwrap_or_else(|| UNKNOWN.to_string()),
    }
}

pub fn extract_disease(text: &str) -> Option<&'static str> {
    if let Some(found) = DISEASE_KEYWORDS.iter().find(|k| text.contains(*k)) {
        return Some(*found);
    }

    let lower = text.to_lowercase();
    DISEASE_KEYWORDS_EN
        .iter()
        .find(|k| lower.contains(*k))
        .copied()
}

pub fn extract_severity(text: &str) -> Severity {
    let lower = text.to_lowercase().replace(SEVERITY_HEADING, "");

    SEVERITY_MARKERS
        .iter()
        .find(|(_, markers)| markers.iter().any(|m| lower.contains(m)))
        .map(|(severity, _)| *severity)
        .unwrap_or(Severity::Unknown)
}

/// First parseable `<number>%` as a fraction, clamped to [0, 1].
/// Full-width digits and decimal points count as their ASCII forms.
pub fn extract_confidence(text: &str) -> Option<f64> {
    CONFIDENCE_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| to_ascii_number(m.as_str()).parse::<f64>().ok())
        .map(|value| (value / 100.0).clamp(0.0, 1.0))
}

fn to_ascii_number(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
            '．' => '.',
            _ => c,
        })
        .collect()
}

fn labelled_line(re: &Regex, text: &str) -> Option<String> {
    let caps = re.captures(text)?;
    let value = caps.get(1)?.as_str().trim().trim_matches('*').trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_diagnosis() {
        let details = extract_details("检测到严重纹枯病，置信度85.5%");
        assert_eq!(details.disease, "纹枯病");
        assert_eq!(details.severity, Severity::Severe);
        assert!((details.confidence - 0.855).abs() < 1e-9);
    }

    #[test]
    fn test_nothing_found() {
        let details = extract_details("The picture is blurry.");
        assert_eq!(details, Details::default());
    }

    #[test]
    fn test_first_keyword_in_list_order_wins() {
        // 锈病 comes before 赤霉病 in the list even though it appears later in the text
        assert_eq!(extract_disease("赤霉病，伴随少量锈病"), Some("锈病"));
        assert_eq!(extract_disease("玉米大斑病"), Some("大斑病"));
    }

    #[test]
    fn test_english_keywords() {
        assert_eq!(extract_disease("Likely Sheath Blight on lower leaves"), Some("sheath blight"));
    }

    #[test]
    fn test_severity_priority() {
        assert_eq!(extract_severity("从轻微发展到中度"), Severity::Moderate);
        assert_eq!(extract_severity("轻度，局部严重"), Severity::Severe);
        assert_eq!(extract_severity("mild spotting"), Severity::Mild);
        assert_eq!(extract_severity("无明显病害"), Severity::Unknown);
    }

    #[test]
    fn test_severity_heading_is_not_a_level() {
        assert_eq!(extract_severity("**严重程度**：轻微"), Severity::Mild);
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(extract_confidence("置信度 150%"), Some(1.0));
        assert_eq!(extract_confidence("置信度：92％"), Some(0.92));
        assert_eq!(extract_confidence("no number"), None);
    }

    #[test]
    fn test_full_width_confidence() {
        assert_eq!(extract_confidence("置信度８５％"), Some(0.85));
        assert_eq!(extract_confidence("置信度：８５．５%"), Some(0.855));
        assert_eq!(extract_details("稻瘟病，置信度９０％").confidence, 0.9);
    }

    #[test]
    fn test_unparseable_digits_fall_through_to_next_match() {
        // Arabic-Indic digits match \d but do not parse
        assert_eq!(extract_confidence("٨٥% 然后 70%"), Some(0.7));
    }

    #[test]
    fn test_first_percentage_wins() {
        assert_eq!(extract_confidence("病斑覆盖 30%，置信度 80%"), Some(0.3));
    }

    #[test]
    fn test_structured_answer() {
        let text = "1. **病害名称**：稻瘟病\n\
                    2. **症状描述**：叶片出现梭形褐色病斑\n\
                    3. **严重程度**：中等\n\
                    4. **置信度**：78%\n\
                    5. **防治建议**：喷施三环唑，注意排水\n\
                    6. **紧急程度**：中";
        let details = extract_details(text);
        assert_eq!(details.disease, "稻瘟病");
        assert_eq!(details.severity, Severity::Moderate);
        assert!((details.confidence - 0.78).abs() < 1e-9);
        assert_eq!(details.symptoms, "叶片出现梭形褐色病斑");
        assert_eq!(details.solution, "喷施三环唑，注意排水");
    }

    #[test]
    fn test_deterministic() {
        let text = "严重稻瘟病 66.6%";
        assert_eq!(extract_details(text), extract_details(text));
    }
}
