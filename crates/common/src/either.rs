//! Success/failure container used to compose independent validation checks.

/// A value that is either a success (`Ok`) or a failure (`Fail`).
///
/// Unlike `std::result::Result`, [`Either::chain_each`] collects every
/// per-element failure instead of stopping at the first one, so a single
/// validation pass can report all missing references at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Either<T, E> {
    Ok(T),
    Fail(E),
}

impl<T, E> Either<T, E> {
    /// Creates a success.
    pub fn ok(value: T) -> Self {
        Either::Ok(value)
    }

    /// Creates a failure.
    pub fn fail(error: E) -> Self {
        Either::Fail(error)
    }

    /// Runs a fallible closure and captures its outcome.
    pub fn safe<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<T, E>,
    {
        f().into()
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Either::Ok(_))
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Either::Fail(_))
    }

    /// Returns the success value, if any.
    pub fn ok_value(&self) -> Option<&T> {
        match self {
            Either::Ok(value) => Some(value),
            Either::Fail(_) => None,
        }
    }

    /// Returns the failure value, if any.
    pub fn fail_value(&self) -> Option<&E> {
        match self {
            Either::Ok(_) => None,
            Either::Fail(error) => Some(error),
        }
    }

    /// Transforms the success value, leaving a failure untouched.
    pub fn map<U, F>(self, f: F) -> Either<U, E>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Either::Ok(value) => Either::Ok(f(value)),
            Either::Fail(error) => Either::Fail(error),
        }
    }

    /// Transforms the failure value, leaving a success untouched.
    pub fn map_fail<E2, F>(self, f: F) -> Either<T, E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            Either::Ok(value) => Either::Ok(value),
            Either::Fail(error) => Either::Fail(f(error)),
        }
    }

    /// Sequences a dependent fallible step. A prior failure short-circuits.
    pub fn chain<U, F>(self, f: F) -> Either<U, E>
    where
        F: FnOnce(T) -> Either<U, E>,
    {
        match self {
            Either::Ok(value) => f(value),
            Either::Fail(error) => Either::Fail(error),
        }
    }

    /// Applies a fallible step to every element of a collection success value.
    ///
    /// Every element is evaluated. If any fails, the result is a failure
    /// holding all element errors in input order; otherwise a success holding
    /// all mapped values. A prior failure is carried through as a single-item
    /// error list.
    pub fn chain_each<I, U, E2, F>(self, mut f: F) -> Either<Vec<U>, Vec<E2>>
    where
        T: IntoIterator<Item = I>,
        E: Into<E2>,
        F: FnMut(I) -> Either<U, E2>,
    {
        match self {
            Either::Ok(items) => {
                let mut oks = Vec::new();
                let mut errors = Vec::new();
                for item in items {
                    match f(item) {
                        Either::Ok(value) => oks.push(value),
                        Either::Fail(error) => errors.push(error),
                    }
                }
                if errors.is_empty() {
                    Either::Ok(oks)
                } else {
                    Either::Fail(errors)
                }
            }
            Either::Fail(error) => Either::Fail(vec![error.into()]),
        }
    }

    /// Converts into a standard `Result`.
    pub fn into_result(self) -> Result<T, E> {
        self.into()
    }
}

impl<T, E> From<Result<T, E>> for Either<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Either::Ok(value),
            Err(error) => Either::Fail(error),
        }
    }
}

impl<T, E> From<Either<T, E>> for Result<T, E> {
    fn from(either: Either<T, E>) -> Self {
        match either {
            Either::Ok(value) => Ok(value),
            Either::Fail(error) => Err(error),
        }
    }
}
