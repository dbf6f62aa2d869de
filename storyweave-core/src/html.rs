//! HTML assembly for the rendered story.
//!
//! Pure string formatting: no external calls and no validation. Theme
//! colors are interpolated uninterpreted; narrative text is HTML-escaped.
//! Illustration placement alternates by section ordinal parity: even
//! ordinals put the image on the left, odd ordinals on the right.

use crate::theme::StoryTheme;
use html_escape::encode_text;

/// One section ready for layout.
#[derive(Debug, Clone)]
pub struct AssembledSection {
    /// Layout parity and ordering position.
    pub ordinal: usize,

    /// Value used verbatim as the `img src` attribute.
    pub image_src: String,

    /// Narrative text for the section.
    pub text: String,
}

/// Assemble the complete HTML document for a story.
pub fn assemble(
    theme: &StoryTheme,
    title: &str,
    introduction: &str,
    sections: &[AssembledSection],
) -> String {
    let mut parts = String::from("\n");
    for section in sections {
        parts.push('\n');
        parts.push_str(&section_html(theme, section));
    }

    let title_block = format!(
        r#"<div style="text-align: center"><h1>{}</h1></div>"#,
        encode_text(title)
    );
    let intro_block = format!("<p>{}</p>", encode_text(introduction));

    format!(
        r#"<html>
<div style="background-color: {background}; font-family: {family};
    max-width: 1000px; padding: 10px; margin: auto;
    box-shadow: 2px 2px 4px 4px {font}; color: {font}">
{title_block}
{intro_block}
{parts}
</div>
</html>
"#,
        background = theme.background_color,
        family = theme.font_family,
        font = theme.font_color,
    )
}

fn section_html(theme: &StoryTheme, section: &AssembledSection) -> String {
    let image_cell = |corner: &str| {
        format!(
            r#"<td style="padding: 0px"><img src="{src}" style="display:block; height: 300px; border-radius: {corner}" width="100%"></td>"#,
            src = section.image_src,
        )
    };
    let text_cell = |align: &str, margin: &str| {
        format!(
            r#"<td><div style="line-height: 1.3; text-align: {align}; font-size: 20px; {margin}">{text}</div></td>"#,
            text = encode_text(&section.text),
        )
    };

    // Even ordinal: illustration left, text right. Odd: the inverse.
    let row = if section.ordinal % 2 == 0 {
        format!(
            "{}\n{}",
            image_cell("24px 0px 0px 24px"),
            text_cell("left", "margin-left: 16px;")
        )
    } else {
        format!(
            "{}\n{}",
            text_cell("right", "margin-right: 16px;"),
            image_cell("0px 24px 24px 0px")
        )
    };

    format!(
        r#"<div style="height: 10px"></div>
<div style="background-color: {background}; margin: auto; box-shadow: 2px 2px 3px 3px {font}; border-radius: 25px;">
<table style="margin: auto; color: {font}; table-layout: fixed; width: 980px; height: 300px; padding: 0px">
<tr>
{row}
</tr>
</table>
</div>
"#,
        background = theme.background_color,
        font = theme.font_color,
    )
}
