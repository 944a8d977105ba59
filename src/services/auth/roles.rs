/// Role check with at-least-one-of semantics.
///
/// - `required` empty → any identity passes.
/// - otherwise → passes iff `held` contains at least one required role.
pub fn has_any_role<R, H>(required: &[R], held: &[H]) -> bool
where
    R: AsRef<str>,
    H: AsRef<str>,
{
    if required.is_empty() {
        return true;
    }

    required
        .iter()
        .any(|role| held.iter().any(|h| h.as_ref() == role.as_ref()))
}
