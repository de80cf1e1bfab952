/// Expand `${NAME}` placeholders from the process environment.
///
/// Placeholders naming an unset variable stay in the output untouched, so a
/// half-configured file still parses and the missing value is visible.
pub fn substitute_env(input: &str) -> String {
    expand(input, |name| std::env::var(name).ok())
}

fn expand(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated: copy the remainder verbatim.
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match lookup(name).filter(|_| !name.is_empty()) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "REGISTRY_USER" => Some("svc-runner".into()),
            "TAG" => Some("prod".into()),
            _ => None,
        }
    }

    #[rstest]
    #[case("user = \"${REGISTRY_USER}\"", "user = \"svc-runner\"")]
    #[case("${TAG}-${TAG}", "prod-prod")]
    #[case("${UNSET_VALUE}", "${UNSET_VALUE}")]
    #[case("${}", "${}")]
    #[case("tail ${TAG", "tail ${TAG")]
    #[case("no placeholders", "no placeholders")]
    #[case("$TAG", "$TAG")]
    fn expands_placeholders(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(expand(input, lookup), expected);
    }
}
