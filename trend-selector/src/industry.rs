//! Industry labelling from an injected keyword map.
//!
//! The selection core only reads `industry` strings; this classifier is the
//! single place where a label is derived from a display name.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::SecurityHistory;

/// Catch-all label for securities without a recognised industry.
pub const UNCLASSIFIED_INDUSTRY: &str = "unclassified";

/// One industry and the name fragments that identify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryRule {
    pub industry: String,
    pub keywords: Vec<String>,
}

/// Ordered `industry → keywords` table. Earlier rules win on overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndustryKeywordMap(Vec<IndustryRule>);

impl IndustryKeywordMap {
    pub fn new(rules: Vec<IndustryRule>) -> Self {
        Self(rules)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn rules(&self) -> &[IndustryRule] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for IndustryKeywordMap {
    fn default() -> Self {
        const DEFAULT_RULES: &[(&str, &[&str])] = &[
            ("半导体", &["半导体", "芯片", "集成电路"]),
            ("医药", &["医药", "医疗", "生物", "创新药", "中药"]),
            ("新能源", &["新能源", "光伏", "锂电", "电池", "储能", "碳中和"]),
            ("消费", &["消费", "食品", "饮料", "酒", "家电"]),
            ("金融", &["证券", "券商", "银行", "保险", "金融"]),
            (
                "科技",
                &["科技", "计算机", "软件", "人工智能", "通信", "5G", "云计算", "传媒", "游戏"],
            ),
            ("军工", &["军工", "国防", "航天"]),
            ("资源", &["有色", "煤炭", "钢铁", "稀土", "能源", "化工"]),
            ("地产基建", &["地产", "房地产", "基建", "建材"]),
            ("黄金", &["黄金"]),
            ("债券", &["国债", "债", "信用"]),
            ("海外", &["纳斯达克", "标普", "恒生", "日经", "德国", "法国", "海外", "中概"]),
            (
                "宽基",
                &["沪深300", "中证500", "中证1000", "上证50", "创业板", "科创", "A50", "红利"],
            ),
        ];

        Self(
            DEFAULT_RULES
                .iter()
                .map(|(industry, keywords)| IndustryRule {
                    industry: (*industry).to_string(),
                    keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
                })
                .collect(),
        )
    }
}

/// Assigns industry labels by keyword match on the display name.
#[derive(Debug, Clone)]
pub struct IndustryClassifier {
    map: IndustryKeywordMap,
}

impl IndustryClassifier {
    pub fn new(map: IndustryKeywordMap) -> Self {
        Self { map }
    }

    /// First industry (in map order) with a keyword contained in `display_name`.
    pub fn classify(&self, display_name: &str) -> &str {
        self.map
            .rules()
            .iter()
            .find(|rule| {
                rule.keywords
                    .iter()
                    .any(|k| !k.is_empty() && display_name.contains(k.as_str()))
            })
            .map_or(UNCLASSIFIED_INDUSTRY, |rule| rule.industry.as_str())
    }

    /// Fill a missing or blank label; existing labels are left alone.
    pub fn fill(&self, history: &mut SecurityHistory) {
        let has_label = history
            .industry
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty());
        if !has_label {
            let label = self.classify(&history.display_name).to_string();
            debug!(symbol = %history.symbol, industry = %label, "Assigned industry");
            history.industry = Some(label);
        }
    }
}

/// Normalise an optional label to the form the pipeline reads.
pub fn industry_label(industry: Option<&str>) -> String {
    match industry.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => UNCLASSIFIED_INDUSTRY.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("华夏国证半导体芯片ETF", "半导体" ; "semiconductor")]
    #[test_case("易方达沪深300ETF", "宽基" ; "broad index")]
    #[test_case("华安黄金ETF", "黄金" ; "gold")]
    #[test_case("某某主题ETF", UNCLASSIFIED_INDUSTRY ; "no match")]
    fn test_default_classification(name: &str, expected: &str) {
        let classifier = IndustryClassifier::new(IndustryKeywordMap::default());
        assert_eq!(classifier.classify(name), expected);
    }

    #[test]
    fn test_map_order_wins() {
        let map = IndustryKeywordMap::new(vec![
            IndustryRule {
                industry: "first".into(),
                keywords: vec!["tech".into()],
            },
            IndustryRule {
                industry: "second".into(),
                keywords: vec!["tech".into()],
            },
        ]);
        assert_eq!(IndustryClassifier::new(map).classify("big tech fund"), "first");
    }

    #[test]
    fn test_fill_keeps_existing_label() {
        let classifier = IndustryClassifier::new(IndustryKeywordMap::default());

        let mut labelled = SecurityHistory::new("A", "半导体ETF", vec![]).with_industry("custom");
        classifier.fill(&mut labelled);
        assert_eq!(labelled.industry.as_deref(), Some("custom"));

        let mut blank = SecurityHistory::new("B", "半导体ETF", vec![]).with_industry("  ");
        classifier.fill(&mut blank);
        assert_eq!(blank.industry.as_deref(), Some("半导体"));
    }

    #[test]
    fn test_industry_label() {
        assert_eq!(industry_label(None), UNCLASSIFIED_INDUSTRY);
        assert_eq!(industry_label(Some("")), UNCLASSIFIED_INDUSTRY);
        assert_eq!(industry_label(Some(" 医药 ")), "医药");
    }

    #[test]
    fn test_json_shape() {
        let map: IndustryKeywordMap =
            serde_json::from_str(r#"[{"industry": "x", "keywords": ["a", "b"]}]"#).unwrap();
        assert_eq!(map.rules().len(), 1);
        assert_eq!(map.rules()[0].keywords, vec!["a", "b"]);
    }
}
