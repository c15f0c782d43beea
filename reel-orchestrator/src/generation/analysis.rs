//! Complexity classification and render-time estimation

use reel_core::domain::render::{Complexity, Quality, RenderConfig};

const SIMPLE_MARKERS: &[&str] = &["Create", "Write", "FadeIn", "FadeOut"];
const MEDIUM_MARKERS: &[&str] = &["Transform", "ReplacementTransform", "AnimationGroup"];
const COMPLEX_MARKERS: &[&str] = &["UpdateFromFunc", "always_redraw", "ValueTracker", "DecimalNumber"];

/// Classifies code by the capabilities it uses, weighted by length.
///
/// Each marker present adds its tier weight once (1, 2 or 3); more than 25
/// lines adds 1, more than 50 adds 2.
pub fn analyze_complexity(code: &str) -> Complexity {
    let tiers: [(&[&str], u32); 3] = [(SIMPLE_MARKERS, 1), (MEDIUM_MARKERS, 2), (COMPLEX_MARKERS, 3)];

    let mut score: u32 = tiers
        .iter()
        .map(|(markers, weight)| {
            markers.iter().filter(|m| code.contains(*m)).count() as u32 * weight
        })
        .sum();

    let lines = code.split('\n').count();
    if lines > 50 {
        score += 2;
    } else if lines > 25 {
        score += 1;
    }

    match score {
        0..=3 => Complexity::Simple,
        4..=7 => Complexity::Medium,
        _ => Complexity::Complex,
    }
}

/// Estimated render duration in seconds
pub fn estimate_render_time(complexity: Complexity, config: &RenderConfig) -> u64 {
    let base = match complexity {
        Complexity::Simple => 15.0,
        Complexity::Medium => 30.0,
        Complexity::Complex => 60.0,
    };

    let quality_factor = match config.quality {
        Some(Quality::High) => 1.5,
        Some(Quality::Low) => 0.7,
        _ => 1.0,
    };

    // Two seconds of rendering per second of animation
    let duration = f64::from(config.duration.unwrap_or(0)) * 2.0;

    (base * quality_factor + duration).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_scene_is_simple() {
        assert_eq!(analyze_complexity("self.play(Write(Text('hi')))"), Complexity::Simple);
        assert_eq!(analyze_complexity(""), Complexity::Simple);
    }

    #[test]
    fn test_markers_raise_complexity() {
        // Transform also matches inside ReplacementTransform: 2 + 2
        let code = "self.play(ReplacementTransform(a, b))";
        assert_eq!(analyze_complexity(code), Complexity::Medium);

        let code = "t = ValueTracker(0)\nn = DecimalNumber(0)\nalways_redraw(f)\nself.play(Create(c))";
        assert_eq!(analyze_complexity(code), Complexity::Complex);
    }

    #[test]
    fn test_line_count_weighs_in() {
        let long = vec!["self.wait()"; 30].join("\n");
        let code = format!("{}\nself.play(Create(c), Write(t), FadeIn(x))", long);
        // 3 markers + 1 for > 25 lines
        assert_eq!(analyze_complexity(&code), Complexity::Medium);
    }

    #[test]
    fn test_render_time_table() {
        let plain = RenderConfig::default();
        assert_eq!(estimate_render_time(Complexity::Simple, &plain), 15);
        assert_eq!(estimate_render_time(Complexity::Medium, &plain), 30);
        assert_eq!(estimate_render_time(Complexity::Complex, &plain), 60);

        let high = RenderConfig {
            quality: Some(Quality::High),
            duration: Some(10),
            resolution: None,
        };
        assert_eq!(estimate_render_time(Complexity::Medium, &high), 65);

        let low = RenderConfig {
            quality: Some(Quality::Low),
            ..RenderConfig::default()
        };
        assert_eq!(estimate_render_time(Complexity::Simple, &low), 11);
    }
}
