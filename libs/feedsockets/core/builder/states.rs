//! Builder progress markers
//!
//! A feed client is unusable without an endpoint and a frame router, so
//! `build()` only exists once both markers read "set". The marker traits
//! are sealed; only the four states below exist.

use std::marker::PhantomData;

mod sealed {
    pub trait Sealed {}
}

/// Whether the feed endpoint is known
pub trait UrlState: sealed::Sealed {}

/// Whether frames have somewhere to go
pub trait RouterState: sealed::Sealed {}

/// No feed endpoint yet
#[derive(Debug)]
pub struct NoUrl;

/// Feed endpoint given via `url()`
#[derive(Debug)]
pub struct HasUrl;

/// No router yet
#[derive(Debug)]
pub struct NoRouter;

/// Router and its handlers registered via `router()`
#[derive(Debug)]
pub struct HasRouter;

impl sealed::Sealed for NoUrl {}
impl sealed::Sealed for HasUrl {}
impl sealed::Sealed for NoRouter {}
impl sealed::Sealed for HasRouter {}

impl UrlState for NoUrl {}
impl UrlState for HasUrl {}
impl RouterState for NoRouter {}
impl RouterState for HasRouter {}

/// Zero-sized carrier of both markers inside the builder
#[derive(Debug, Clone, Copy)]
pub struct TypeState<U, R>(PhantomData<(U, R)>);

impl<U, R> TypeState<U, R> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_zero_sized() {
        assert_eq!(std::mem::size_of::<TypeState<NoUrl, NoRouter>>(), 0);
        assert_eq!(std::mem::size_of::<TypeState<HasUrl, HasRouter>>(), 0);
    }
}
