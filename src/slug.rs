// src/slug.rs

/// URL slug: lowercase, spaces become hyphens, anything outside `[a-z0-9-]`
/// is dropped, hyphen runs collapse and edge hyphens are trimmed.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        let c = if c == ' ' { '-' } else { c };
        match c {
            'a'..='z' | '0'..='9' => slug.push(c),
            '-' if !slug.ends_with('-') => slug.push('-'),
            _ => {}
        }
    }
    slug.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn strips_punctuation() {
        assert_eq!(slugify("22K Gold Diamond Ring!!"), "22k-gold-diamond-ring");
    }

    #[test]
    fn collapses_and_trims_hyphens() {
        assert_eq!(slugify("  Rose -- Gold  "), "rose-gold");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn drops_non_ascii() {
        assert_eq!(slugify("Café Pendant"), "caf-pendant");
        assert_eq!(slugify("18K Rose Gold Drop Earrings"), "18k-rose-gold-drop-earrings");
    }
}
