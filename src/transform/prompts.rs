/// Sent with the uploaded photo to obtain a description.
pub const ANALYSIS_INSTRUCTION: &str = "Analyze this image and describe what you see in detail \
so it can be recreated as stylized artwork. Focus on:
- Main subject(s) or people in the image
- Setting and environment
- Clothing and accessories
- Facial features and expressions
- Overall composition
- Colors and lighting
Provide a detailed description that can be used to recreate the scene as artwork.";

const STYLE_REQUIREMENTS: &str = "Style requirements:
- Bold comic book art style with thick outlines
- Vibrant, saturated colors (hot pinks, electric blues, neon greens, bright oranges)
- Cel-shaded, flat coloring technique
- High contrast lighting with dramatic shadows
- Urban street art aesthetic
- Slightly exaggerated proportions and features
- Clean vector art style similar to video game loading screens
- Professional game art quality
- 80s/90s retro aesthetic with neon colors";

/// Synthesis instruction embedding the description verbatim.
pub fn style_prompt(description: &str) -> String {
    format!(
        "Create a stylized artwork based on this description: {description}\n\n\
         {STYLE_REQUIREMENTS}\n\n\
         Make it look like official promotional game character art."
    )
}

/// Text returned in place of an image when every generator came up empty.
pub fn fallback_text(description: &str) -> String {
    format!(
        "**Style Analysis Complete**\n\n{description}\n\n---\n\n\
         **Note**: Image generation is currently unavailable. \
         This analysis describes how your photo would look as stylized artwork."
    )
}
