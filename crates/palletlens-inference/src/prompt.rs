//! Fixed instruction sent with every analysis request.
//!
//! Not operator-editable. Changing this text changes the character of every
//! description the model produces.

/// System-role framing for a warehouse problem report.
pub const SYSTEM_PROMPT: &str = "You are assisting a warehouse operator who is filing a problem report. \
Describe the image objectively. Assess the condition of the goods, packaging integrity, \
label visibility and legibility, safety compliance, storage practice, and any visible \
handling issues. Report only what can be seen. Write a single paragraph and do not draw \
conclusions about cause or responsibility.";

/// User-role text that accompanies the image.
pub const USER_PROMPT: &str = "What's in this image?";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_covers_inspection_areas() {
        for area in [
            "condition",
            "packaging integrity",
            "label visibility",
            "safety compliance",
            "storage practice",
            "handling issues",
            "single paragraph",
        ] {
            assert!(SYSTEM_PROMPT.contains(area), "missing: {}", area);
        }
    }
}
