//! Two-tier pillar extraction from the rendered result surface.
//!
//! The scoped tier reads the glyphs of the chart container only. When that
//! yields fewer than four pillars (container missing or restyled) the global
//! tier scans every marker glyph on the page. The first four valid pillars in
//! encountered order are taken as year, month, day and hour.

use super::form::SurfaceLayout;
use crate::automation::{AutomationSession, GlyphQuery};
use crate::chart::{FourPillarSet, Pillar};
use crate::error::{AcquisitionError, AcquisitionResult};

/// Glyph queries in the order they are tried.
pub fn extraction_tiers(layout: &SurfaceLayout) -> [GlyphQuery; 2] {
    [
        GlyphQuery::Scoped {
            container: layout.result_container.clone(),
            required_markers: layout.container_markers.clone(),
            leaf: layout.result_marker.clone(),
        },
        GlyphQuery::Global {
            leaf: layout.result_marker.clone(),
        },
    ]
}

/// Extract a chart, falling through [`extraction_tiers`].
pub async fn extract_pillars(
    session: &mut dyn AutomationSession,
    layout: &SurfaceLayout,
) -> AcquisitionResult<FourPillarSet> {
    let mut last_seen = Vec::new();
    let mut best_valid = 0;

    for query in extraction_tiers(layout) {
        let texts = session.collect_glyphs(&query).await?;
        let pillars = valid_pillars(&texts);
        tracing::debug!(?query, found = ?texts, valid = pillars.len(), "extraction tier");

        if let Some(chart) = FourPillarSet::from_slice(pillars.get(..4).unwrap_or_default()) {
            return Ok(chart);
        }
        if pillars.len() >= best_valid {
            best_valid = pillars.len();
            last_seen = texts;
        }
    }

    Err(AcquisitionError::InsufficientData {
        found: last_seen,
        valid: best_valid,
    })
}

/// Non-empty texts that parse as pillars, in order.
fn valid_pillars(texts: &[String]) -> Vec<Pillar> {
    texts
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .filter_map(|t| match Pillar::parse(t) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::debug!("skipping non-pillar glyph {t:?}: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::scripted::{GlyphBlock, ResultSurface, ScriptedLauncher, ScriptedSurface};
    use crate::automation::{SessionLauncher, SubmitTier};

    async fn extract(blocks: Vec<GlyphBlock>) -> AcquisitionResult<FourPillarSet> {
        let launcher = ScriptedLauncher::new(ScriptedSurface {
            result: ResultSurface::Fixed(blocks),
            ..Default::default()
        });
        let mut s = launcher.open().await.unwrap();
        s.navigate("https://calc.test/", 100).await.unwrap();
        s.submit("確定送出", SubmitTier::Interactive, 100).await.unwrap();
        let result = extract_pillars(s.as_mut(), &SurfaceLayout::default()).await;
        s.close().await.unwrap();
        result
    }

    #[tokio::test]
    async fn test_scoped_tier_wins() {
        let chart = extract(vec![
            GlyphBlock::loose(&["甲子"]),
            GlyphBlock::contained("四柱八字", &["丁卯", "乙巳", "己巳", "己巳", "庚午"]),
        ])
        .await
        .unwrap();
        assert_eq!(chart.to_string(), "丁卯 乙巳 己巳 己巳");
    }

    #[tokio::test]
    async fn test_global_fallback_keeps_encountered_order() {
        // No container carries both markers, so the scoped tier finds nothing.
        let chart = extract(vec![
            GlyphBlock::contained("四季", &["癸亥"]),
            GlyphBlock::loose(&["壬戌", "辛酉"]),
            GlyphBlock::loose(&["庚申", "己未"]),
        ])
        .await
        .unwrap();
        assert_eq!(chart.to_string(), "癸亥 壬戌 辛酉 庚申");
    }

    #[tokio::test]
    async fn test_short_container_falls_back() {
        let chart = extract(vec![
            GlyphBlock::contained("四柱", &["甲子", "乙丑"]),
            GlyphBlock::loose(&["丙寅", "丁卯"]),
        ])
        .await
        .unwrap();
        assert_eq!(chart.to_string(), "甲子 乙丑 丙寅 丁卯");
    }

    #[tokio::test]
    async fn test_three_glyphs_is_insufficient() {
        let err = extract(vec![GlyphBlock::contained("四柱", &["甲子", "乙丑", "丙寅"])])
            .await
            .unwrap_err();
        match err {
            AcquisitionError::InsufficientData { found, valid } => {
                assert_eq!(valid, 3);
                assert_eq!(found, vec!["甲子", "乙丑", "丙寅"]);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_pillar_text_is_skipped() {
        let chart = extract(vec![GlyphBlock::contained(
            "四柱",
            &["年柱", "", "甲子", "乙丑", " 丙寅 ", "丁卯"],
        )])
        .await
        .unwrap();
        assert_eq!(chart.to_string(), "甲子 乙丑 丙寅 丁卯");

        let err = extract(vec![GlyphBlock::loose(&["甲丑", "乙子", "甲子", "乙丑"])])
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::InsufficientData { valid: 2, .. }));
    }
}
