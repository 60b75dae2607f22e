use std::collections::HashMap;
use std::fmt::Write;

use lazy_static::lazy_static;

use crate::labels::{DisplayNames, Label};
use crate::pipeline::CycleReport;

/// Shown when a cycle has nothing to report
pub const NO_DATA_MESSAGE: &str = "No data available yet";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
    Gray,
}

impl Color {
    pub fn name(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Blue => "blue",
            Self::Gray => "gray",
        }
    }

    fn ansi(self) -> &'static str {
        match self {
            Self::Red => "\x1b[31m",
            Self::Green => "\x1b[32m",
            Self::Yellow => "\x1b[33m",
            Self::Blue => "\x1b[34m",
            Self::Gray => "\x1b[90m",
        }
    }

    pub fn paint(self, text: &str) -> String {
        format!("{}{}\x1b[0m", self.ansi(), text)
    }
}

lazy_static! {
    static ref COLORS: HashMap<&'static str, Color> = {
        let mut m = HashMap::new();
        m.insert("Cemas", Color::Red);
        m.insert("Rileks", Color::Green);
        m.insert("Tegang", Color::Yellow);
        m.insert("Tenang", Color::Blue);
        m.insert("Rendah", Color::Green);
        m.insert("Sedang", Color::Yellow);
        m.insert("Tinggi", Color::Red);
        m
    };

    /// Follow-up actions per dengue risk tier, most urgent first.
    static ref RECOMMENDATIONS: HashMap<&'static str, Vec<&'static str>> = {
        let mut m = HashMap::new();
        m.insert("Rendah", vec![
            "Lanjutkan gerakan 3M Plus secara rutin",
            "Pantau genangan air setelah hujan",
        ]);
        m.insert("Sedang", vec![
            "Tingkatkan pemeriksaan jentik berkala oleh kader",
            "Bersihkan TPS liar dan genangan air",
            "Sosialisasi gejala DBD kepada warga",
        ]);
        m.insert("Tinggi", vec![
            "Lakukan fogging terfokus di wilayah kasus",
            "Aktifkan posko kewaspadaan DBD di puskesmas",
            "Gerakan serentak pemberantasan sarang nyamuk",
            "Siapkan kapasitas rujukan rumah sakit",
        ]);
        m
    };
}

/// Colour for a canonical label name. Anything without one, including
/// `Unknown`, is gray.
pub fn color_for(label: &str) -> Color {
    COLORS.get(label).copied().unwrap_or(Color::Gray)
}

/// Ordered recommendations for a label; empty for labels without any.
pub fn recommendations_for(label: &str) -> &'static [&'static str] {
    RECOMMENDATIONS.get(label).map(Vec::as_slice).unwrap_or(&[])
}

fn painted(label: &Label, names: &DisplayNames, ansi: bool) -> String {
    let text = names.display(label);
    if ansi {
        color_for(label.name()).paint(text)
    } else {
        text.to_string()
    }
}

/// One-line status for the most recent reading.
pub fn render_status(report: &CycleReport, names: &DisplayNames, ansi: bool) -> String {
    match report.latest() {
        Some(latest) => format!("Latest condition: {}", painted(&latest.label, names, ansi)),
        None => NO_DATA_MESSAGE.to_string(),
    }
}

/// The last `rows` records as an aligned text table.
pub fn render_table(report: &CycleReport, rows: usize, names: &DisplayNames) -> String {
    let mut header = report.columns();
    header.push("Label".to_string());

    let body: Vec<Vec<String>> = report
        .tail(rows)
        .iter()
        .map(|labeled| {
            let mut cells = report.row_values(labeled);
            cells.push(names.display(&labeled.label).to_string());
            cells
        })
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            body.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(header[i].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    for line in std::iter::once(&header).chain(body.iter()) {
        let cells: Vec<String> = line
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:<w$}", cell, w = w))
            .collect();
        let _ = writeln!(out, "{}", cells.join("  ").trim_end());
    }
    out
}

/// Horizontal bar per label, scaled so the largest count spans `width`.
pub fn render_distribution(report: &CycleReport, width: usize, names: &DisplayNames, ansi: bool) -> String {
    let distribution = report.distribution();
    let max = distribution.iter().map(|(_, n)| *n).max().unwrap_or(0);
    let label_width = distribution
        .iter()
        .map(|(name, _)| names.display_name(name).chars().count())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for (name, count) in &distribution {
        let len = if max == 0 { 0 } else { (count * width).div_ceil(max) };
        let bar = "#".repeat(len);
        let bar = if ansi { color_for(name).paint(&bar) } else { bar };
        let _ = writeln!(
            out,
            "{:<lw$} | {} {}",
            names.display_name(name),
            bar,
            count,
            lw = label_width
        );
    }
    out
}

/// Full dashboard text for one cycle: table, distribution, status and,
/// for the latest label, its recommendations.
pub fn render_cycle(report: &CycleReport, tail: usize, names: &DisplayNames, ansi: bool) -> String {
    if report.is_empty() {
        return NO_DATA_MESSAGE.to_string();
    }

    let mut out = String::new();
    out.push_str(&render_table(report, tail, names));
    out.push('\n');
    out.push_str(&render_distribution(report, 40, names, ansi));
    out.push('\n');
    out.push_str(&render_status(report, names, ansi));
    out.push('\n');

    if let Some(latest) = report.latest() {
        for item in recommendations_for(latest.label.name()) {
            let _ = writeln!(out, "  - {}", item);
        }
    }
    if report.dropped() > 0 {
        let _ = writeln!(out, "{} of {} rows dropped", report.dropped(), report.raw_rows());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_colors() {
        assert_eq!(color_for("Cemas"), Color::Red);
        assert_eq!(color_for("Rileks"), Color::Green);
        assert_eq!(color_for("Tegang"), Color::Yellow);
        assert_eq!(color_for("Tenang"), Color::Blue);
        assert_eq!(color_for("Unknown"), Color::Gray);
        assert_eq!(Color::Blue.name(), "blue");
    }

    #[test]
    fn test_recommendations() {
        assert_eq!(recommendations_for("Tinggi").len(), 4);
        assert_eq!(recommendations_for("Rendah")[0], "Lanjutkan gerakan 3M Plus secara rutin");
        assert!(recommendations_for("Cemas").is_empty());
    }

    #[test]
    fn test_paint() {
        assert_eq!(Color::Red.paint("x"), "\x1b[31mx\x1b[0m");
    }
}
