//! The calculation form: its layout and how a chart request fills it.

use crate::automation::AutomationSession;
use crate::calendar::CalendarMoment;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Name written when the caller gave none.
pub const DEFAULT_SUBJECT_NAME: &str = "命主";

/// Name written for the current-moment reference chart.
pub const REFERENCE_SUBJECT_NAME: &str = "今日盤";

/// Sex flag of the form's `_Sex` radio group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Female,
    #[default]
    Male,
}

impl Sex {
    pub fn form_value(self) -> &'static str {
        match self {
            Self::Female => "0",
            Self::Male => "1",
        }
    }
}

/// Selectors and labels of the external surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceLayout {
    pub name_field: String,
    pub sex_radio: String,
    pub year_mode_radio: String,
    /// `_YearMode` value selecting the civil calendar.
    pub civil_year_mode: String,
    pub year_field: String,
    pub month_field: String,
    pub day_field: String,
    pub hour_field: String,
    pub minute_field: String,
    pub submit_label: String,
    /// Leaf elements rendering chart glyphs.
    pub result_marker: String,
    pub result_container: String,
    /// Words the chart container's text must all contain.
    pub container_markers: Vec<String>,
}

impl Default for SurfaceLayout {
    fn default() -> Self {
        Self {
            name_field: "_Name".into(),
            sex_radio: "_Sex".into(),
            year_mode_radio: "_YearMode".into(),
            civil_year_mode: "1".into(),
            year_field: "_Year".into(),
            month_field: "_Month".into(),
            day_field: "_Day".into(),
            hour_field: "_Hour".into(),
            minute_field: "_Min".into(),
            submit_label: "確定送出".into(),
            result_marker: "span.w-blue".into(),
            result_container: "div.w10".into(),
            container_markers: vec!["四".into(), "柱".into()],
        }
    }
}

/// One chart request as typed into the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartForm {
    pub name: String,
    pub sex: Sex,
    /// Civil-calendar moment with a normalized (common era) year.
    pub moment: CalendarMoment,
}

impl ChartForm {
    pub fn new(name: Option<&str>, sex: Sex, moment: CalendarMoment) -> Self {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_SUBJECT_NAME);
        Self {
            name: name.to_string(),
            sex,
            moment,
        }
    }

    /// The current-moment chart request.
    pub fn reference(moment: CalendarMoment) -> Self {
        Self::new(Some(REFERENCE_SUBJECT_NAME), Sex::Male, moment)
    }
}

/// Fill the form by direct assignment. Hour and minute are written only when
/// the page exposes them.
pub async fn populate(
    session: &mut dyn AutomationSession,
    form: &ChartForm,
    layout: &SurfaceLayout,
    field_settle: Duration,
) -> Result<()> {
    if !session.set_field(&layout.name_field, &form.name).await? {
        bail!("form has no {} field", layout.name_field);
    }
    session
        .check_radio(&layout.sex_radio, form.sex.form_value())
        .await?;
    session
        .check_radio(&layout.year_mode_radio, &layout.civil_year_mode)
        .await?;

    let m = &form.moment;
    if !session
        .set_field(&layout.year_field, &m.year.to_string())
        .await?
    {
        bail!("form has no {} field", layout.year_field);
    }
    tokio::time::sleep(field_settle).await;

    for (field, value) in [(&layout.month_field, m.month), (&layout.day_field, m.day)] {
        if !session.set_field(field, &value.to_string()).await? {
            bail!("form has no {field} field");
        }
    }

    for (field, value) in [(&layout.hour_field, m.hour), (&layout.minute_field, m.minute)] {
        if !session.set_field(field, &value.to_string()).await? {
            tracing::debug!(field = %field, "form has no such field, skipped");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_name() {
        let m = CalendarMoment::new(1987, 5, 20, 10, 30);
        assert_eq!(ChartForm::new(None, Sex::Female, m).name, DEFAULT_SUBJECT_NAME);
        assert_eq!(ChartForm::new(Some("  "), Sex::Female, m).name, DEFAULT_SUBJECT_NAME);
        assert_eq!(ChartForm::new(Some(" 王小明 "), Sex::Female, m).name, "王小明");
        assert_eq!(ChartForm::reference(m).name, REFERENCE_SUBJECT_NAME);
        assert_eq!(ChartForm::reference(m).sex.form_value(), "1");
    }
}
