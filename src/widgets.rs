//! Themed SVG widgets rendered from a [`ProfileSummary`].

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::models::{LanguageShare, ProfileSummary, StreakStats};

const CARD_WIDTH: u32 = 495;
const LANGUAGE_LIMIT: usize = 6;
const BAR_WIDTH: f64 = 445.0;
const LANGUAGE_PALETTE: [&str; LANGUAGE_LIMIT] =
    ["#f97316", "#3b82f6", "#22c55e", "#eab308", "#a855f7", "#ec4899"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    pub background: String,
    pub border: String,
    pub title: String,
    pub text: String,
    pub muted: String,
    pub accent: String,
}

impl Theme {
    fn new(name: &str, colors: [&str; 6]) -> Self {
        let [background, border, title, text, muted, accent] = colors.map(str::to_string);
        Self {
            name: name.to_string(),
            background,
            border,
            title,
            text,
            muted,
            accent,
        }
    }
}

/// Theme table available to the widget endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetConfig {
    pub themes: Vec<Theme>,
    pub default_theme: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            themes: vec![
                Theme::new("default", ["#fffefe", "#e4e2e2", "#2f80ed", "#434d58", "#6a737d", "#4c71f2"]),
                Theme::new("dark", ["#151515", "#2b2b2b", "#ffffff", "#d0d0d0", "#8b949e", "#79ff97"]),
                Theme::new("radical", ["#141321", "#2a2742", "#fe428e", "#a9fef7", "#8a8aa8", "#f8d847"]),
                Theme::new("ocean", ["#0b1d2a", "#17394f", "#5ed3f3", "#cde8f5", "#7fa5bb", "#2dd4bf"]),
            ],
            default_theme: "default".to_string(),
        }
    }
}

impl WidgetConfig {
    /// Looks a theme up by name, falling back to the default theme.
    pub fn theme(&self, name: Option<&str>) -> &Theme {
        let wanted = name.unwrap_or(&self.default_theme);
        self.themes
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(wanted))
            .or_else(|| self.themes.iter().find(|t| t.name == self.default_theme))
            .or_else(|| self.themes.first())
            .unwrap_or_else(|| Lazy::force(&FALLBACK_THEME))
    }
}

static FALLBACK_THEME: Lazy<Theme> = Lazy::new(|| {
    Theme::new("plain", ["#ffffff", "#cccccc", "#000000", "#333333", "#666666", "#000000"])
});

pub fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn frame(height: u32, theme: &Theme, title: &str, body: &str) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{CARD_WIDTH}" height="{height}" viewBox="0 0 {CARD_WIDTH} {height}" role="img" aria-label="{title}">
<style>.title{{font:600 18px 'Segoe UI',Ubuntu,sans-serif;fill:{title_color}}}.stat{{font:400 14px 'Segoe UI',Ubuntu,sans-serif;fill:{text}}}.muted{{font:400 12px 'Segoe UI',Ubuntu,sans-serif;fill:{muted}}}</style>
<rect x="0.5" y="0.5" rx="4.5" width="{w}" height="{h}" fill="{background}" stroke="{border}"/>
<text x="25" y="35" class="title">{title}</text>
{body}</svg>"#,
        title_color = theme.title,
        text = theme.text,
        muted = theme.muted,
        background = theme.background,
        border = theme.border,
        w = CARD_WIDTH - 1,
        h = height - 1,
    )
}

pub fn render_profile_card(summary: &ProfileSummary, theme: &Theme) -> String {
    let user = &summary.user;
    let title = escape_xml(&format!("{}'s GitHub Stats", user.display_name()));

    let stats = [
        ("Total stars", summary.total_stars),
        ("Total forks", summary.total_forks),
        ("Original repos", summary.original_repos),
        ("Followers", user.followers),
    ];

    let mut body = String::new();
    for (i, (label, value)) in stats.iter().enumerate() {
        let y = 70 + i as u32 * 25;
        body.push_str(&format!(
            "<text x=\"25\" y=\"{y}\" class=\"stat\">{label}:</text><text x=\"200\" y=\"{y}\" class=\"stat\" font-weight=\"700\" fill=\"{accent}\">{value}</text>\n",
            accent = theme.accent,
        ));
    }
    if let Some(language) = summary.top_language() {
        body.push_str(&format!(
            "<text x=\"25\" y=\"180\" class=\"muted\">@{} · mostly {}</text>\n",
            escape_xml(&user.login),
            escape_xml(language)
        ));
    } else {
        body.push_str(&format!(
            "<text x=\"25\" y=\"180\" class=\"muted\">@{}</text>\n",
            escape_xml(&user.login)
        ));
    }

    frame(195, theme, &title, &body)
}

pub fn render_languages_card(languages: &[LanguageShare], theme: &Theme) -> String {
    let shown = &languages[..languages.len().min(LANGUAGE_LIMIT)];
    let shown_total: f64 = shown.iter().map(|l| l.percent).sum();

    let mut body = String::new();
    if shown.is_empty() {
        body.push_str("<text x=\"25\" y=\"70\" class=\"muted\">No language data yet</text>\n");
        return frame(95, theme, "Most Used Languages", &body);
    }

    body.push_str("<g transform=\"translate(25, 55)\">\n");
    let mut x = 0.0;
    for (language, color) in shown.iter().zip(LANGUAGE_PALETTE) {
        let width = BAR_WIDTH * language.percent / shown_total;
        body.push_str(&format!(
            "<rect x=\"{x:.2}\" y=\"0\" width=\"{width:.2}\" height=\"8\" fill=\"{color}\"/>\n"
        ));
        x += width;
    }
    for (i, (language, color)) in shown.iter().zip(LANGUAGE_PALETTE).enumerate() {
        let col = (i % 2) as f64 * 220.0;
        let row = 30 + (i / 2) as u32 * 22;
        body.push_str(&format!(
            "<circle cx=\"{cx:.0}\" cy=\"{cy}\" r=\"5\" fill=\"{color}\"/><text x=\"{tx:.0}\" y=\"{ty}\" class=\"stat\">{name} {percent:.1}%</text>\n",
            cx = col + 5.0,
            cy = row - 4,
            tx = col + 15.0,
            ty = row,
            name = escape_xml(&language.name),
            percent = language.percent,
        ));
    }
    body.push_str("</g>\n");

    let rows = shown.len().div_ceil(2) as u32;
    frame(100 + rows * 22, theme, "Most Used Languages", &body)
}

/// Three columns: total contributions, current streak, longest streak.
pub fn render_streak_card(login: &str, stats: &StreakStats, theme: &Theme) -> String {
    let title = escape_xml(&format!("@{login}'s Contribution Streak"));
    let longest_note = stats
        .longest_streak_end
        .map(|end| format!("ended {}", end.format("%b %-d, %Y")))
        .unwrap_or_default();
    let columns = [
        (stats.total_contributions, "Contributions", "past year".to_string()),
        (stats.current_streak, "Current streak", days_label(stats.current_streak)),
        (stats.longest_streak, "Longest streak", longest_note),
    ];

    let mut body = String::new();
    for (i, (value, label, note)) in columns.iter().enumerate() {
        let x = 85 + i as u32 * 162;
        body.push_str(&format!(
            "<text x=\"{x}\" y=\"95\" text-anchor=\"middle\" font-size=\"28\" font-weight=\"700\" fill=\"{accent}\">{value}</text>\n<text x=\"{x}\" y=\"125\" text-anchor=\"middle\" class=\"stat\">{label}</text>\n<text x=\"{x}\" y=\"145\" text-anchor=\"middle\" class=\"muted\">{note}</text>\n",
            accent = theme.accent,
            note = escape_xml(note),
        ));
    }

    frame(170, theme, &title, &body)
}

fn days_label(days: u32) -> String {
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{days} days")
    }
}

pub fn render_error_card(message: &str, theme: &Theme) -> String {
    let body = format!(
        "<text x=\"25\" y=\"70\" class=\"stat\">{}</text>\n",
        escape_xml(message)
    );
    frame(95, theme, "Something went wrong", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::fixtures;

    #[test]
    fn unknown_theme_falls_back_to_default() {
        let config = WidgetConfig::default();
        assert_eq!(config.theme(Some("neon")).name, "default");
        assert_eq!(config.theme(None).name, "default");
        assert_eq!(config.theme(Some("Dark")).name, "dark");
    }

    #[test]
    fn profile_card_escapes_user_text() {
        let mut summary = fixtures::summary();
        summary.user.name = Some("<script>alert(1)</script>".into());
        let svg = render_profile_card(&summary, WidgetConfig::default().theme(Some("dark")));
        assert!(svg.starts_with("<svg"));
        assert!(!svg.contains("<script>"));
        assert!(svg.contains("&lt;script&gt;"));
        assert!(svg.contains("#151515"));
        assert!(svg.contains(">60<"));
    }

    #[test]
    fn languages_card_lists_each_language() {
        let summary = fixtures::summary();
        let svg = render_languages_card(&summary.languages, WidgetConfig::default().theme(None));
        assert!(svg.contains("Rust 66.7%"));
        assert!(svg.contains("TypeScript 33.3%"));
        assert_eq!(svg.matches("<circle").count(), 2);
    }

    #[test]
    fn languages_card_without_data() {
        let svg = render_languages_card(&[], WidgetConfig::default().theme(None));
        assert!(svg.contains("No language data yet"));
    }

    #[test]
    fn streak_card_shows_each_figure() {
        let stats = StreakStats {
            total_contributions: 412,
            current_streak: 1,
            longest_streak: 37,
            longest_streak_end: chrono::NaiveDate::from_ymd_opt(2025, 3, 9),
        };
        let svg = render_streak_card("octo<cat>", &stats, WidgetConfig::default().theme(Some("ocean")));
        assert!(svg.contains(">412<"));
        assert!(svg.contains(">37<"));
        assert!(svg.contains("1 day<"));
        assert!(svg.contains("ended Mar 9, 2025"));
        assert!(svg.contains("@octo&lt;cat&gt;"));
        assert!(svg.contains("#0b1d2a"));
    }

    #[test]
    fn streak_card_without_history() {
        let svg = render_streak_card("ghost", &StreakStats::default(), WidgetConfig::default().theme(None));
        assert!(svg.contains("0 days"));
        assert!(!svg.contains("ended"));
    }

    #[test]
    fn error_card_escapes_message() {
        let svg = render_error_card("User \"x\" & co", WidgetConfig::default().theme(None));
        assert!(svg.contains("User &quot;x&quot; &amp; co"));
    }
}
