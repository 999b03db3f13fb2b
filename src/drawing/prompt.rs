//! Text-to-image prompt for plotter-friendly line art.

/// Wrap the user's subject in instructions that steer the image model
/// towards sparse, continuous black strokes on white.
pub fn make_prompt(human_prompt: &str) -> String {
    let subject = human_prompt.trim();
    format!(
        "Create a drawing of a {subject}, using a continuous line art style. \
The artwork should consist of distinct, non-overlapping lines with uniform thickness, making it ideal for vectorization. \
Use only black lines on a white background, avoiding any shading, gradients, or intricate details to simplify the vectorization process. \
Lines must be continuous without breaks, clearly indicating where they start and end to facilitate easy tracing by vector graphic software. \
Aim for minimalism and elegance, using the fewest number of lines possible to convey the subject matter effectively. \
The continuous line should create fluid, abstract forms that bring the subjects to life with minimal lines."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_is_embedded_once() {
        let p = make_prompt("  cat on a fence ");
        assert!(p.starts_with("Create a drawing of a cat on a fence, using a continuous line art style."));
        assert_eq!(p.matches("cat on a fence").count(), 1);
        assert!(p.contains("black lines on a white background"));
    }
}
