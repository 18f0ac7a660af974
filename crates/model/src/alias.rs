//! Field name aliasing
//!
//! In-memory field names are `snake_case`; wire names are `lowerCamelCase`.
//! The mapping is purely lexical and round-trips for every name made of
//! lowercase ASCII words joined by single underscores.

/// `the_nested` -> `theNested`
pub fn to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for (i, c) in name.chars().enumerate() {
        if c == '_' && i > 0 {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    if upper_next {
        // trailing underscore survives
        out.push('_');
    }
    out
}

/// `theNested` -> `the_nested`
pub fn to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_to_camel() {
        assert_eq!(to_camel("name"), "name");
        assert_eq!(to_camel("the_nested"), "theNested");
        assert_eq!(to_camel("effective_time_bound"), "effectiveTimeBound");
    }

    #[test]
    fn test_to_snake() {
        assert_eq!(to_snake("name"), "name");
        assert_eq!(to_snake("theNested"), "the_nested");
        assert_eq!(to_snake("effectiveTimeBound"), "effective_time_bound");
    }

    proptest! {
        #[test]
        fn alias_round_trips(words in prop::collection::vec("[a-z][a-z0-9]{0,6}", 1..5)) {
            let snake = words.join("_");
            prop_assert_eq!(to_snake(&to_camel(&snake)), snake);
        }
    }
}
