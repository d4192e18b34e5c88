/// Runs `request`, turning an error that `is_not_found` recognizes into
/// `Ok(None)`. Every other error is returned unchanged.
pub fn handle_request<T, E, F, P>(request: F, is_not_found: P) -> Result<Option<T>, E>
where
    F: FnOnce() -> Result<T, E>,
    P: Fn(&E) -> bool,
{
    match request() {
        Ok(value) => Ok(Some(value)),
        Err(err) if is_not_found(&err) => Ok(None),
        Err(err) => Err(err),
    }
}
