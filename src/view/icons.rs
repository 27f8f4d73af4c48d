//! Icon glyph lookup for labelled icons.

/// Glyph for a known icon name.
#[must_use]
pub fn glyph(name: &str) -> Option<&'static str> {
    let glyph = match name {
        "area" => "\u{2b1a}",
        "point" => "\u{2022}",
        "alcoholShop" => "\u{1f377}",
        "bakery" => "\u{1f956}",
        "clothingStore" => "\u{1f455}",
        "home" => "\u{2302}",
        "landmarks" => "\u{2691}",
        "naturalAreas" => "\u{2618}",
        "playground" => "\u{25ed}",
        "swimming" => "\u{2248}",
        _ => return None,
    };
    Some(glyph)
}

/// Glyph for `name`, or `fallback` when unknown.
#[must_use]
pub fn glyph_or<'a>(name: &str, fallback: &'a str) -> &'a str {
    glyph(name).unwrap_or(fallback)
}
