//! Naming helpers used to derive relation accessors and foreign keys.
//!
//! - `User` -> accessor `user`, foreign key `userId`
//! - `BlogPost` -> plural accessor `blogPosts`
//! - `user_id` -> `userId`

/// Lower-case the first character: `BlogPost` -> `blogPost`.
pub fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Upper-case the first character: `save` -> `Save`.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Camel-case an underscored name, keeping the first segment's case
/// except for its first letter: `User_id` -> `userId`.
pub fn camelize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, part) in name.split('_').filter(|p| !p.is_empty()).enumerate() {
        if i == 0 {
            out.push_str(&lower_first(part));
        } else {
            out.push_str(&capitalize(part));
        }
    }
    out
}

/// English plural of a model name, good enough for accessor naming.
pub fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.ends_with('s') || lower.ends_with('x') || lower.ends_with("ch") || lower.ends_with("sh")
    {
        format!("{word}es")
    } else if lower.ends_with('y')
        && !matches!(lower.chars().rev().nth(1), Some('a' | 'e' | 'i' | 'o' | 'u'))
    {
        format!("{}ies", &word[..word.len() - 1])
    } else {
        format!("{word}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessor_names() {
        assert_eq!(camelize("User_id"), "userId");
        assert_eq!(camelize("BlogPost_id"), "blogPostId");
        assert_eq!(lower_first(&pluralize("BlogPost")), "blogPosts");
        assert_eq!(pluralize("Category"), "Categories");
        assert_eq!(pluralize("Day"), "Days");
        assert_eq!(pluralize("Box"), "Boxes");
    }
}
