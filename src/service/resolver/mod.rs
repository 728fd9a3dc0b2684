pub mod github;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::{
    base::{
        config::{Config, ResolverKind},
        types::{Msc, Res},
    },
    scanner::MscReference,
};

// Traits.

/// Generic MSC resolver trait that resolvers must implement.
///
/// A resolver turns a reference found in a message into the entry shown in
/// the reply. Implementing this trait allows different metadata sources to be
/// used with the msc-bot.
#[async_trait]
pub trait GenericMscResolver: Send + Sync + 'static {
    /// Resolve a reference.
    ///
    /// Returns `None` when the number does not denote a proposal, so that it
    /// is left out of the reply.
    async fn resolve(&self, reference: &MscReference) -> Res<Option<Msc>>;
}

// Structs.

/// MSC resolver for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct MscResolver {
    inner: Arc<dyn GenericMscResolver>,
}

impl Deref for MscResolver {
    type Target = dyn GenericMscResolver;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl MscResolver {
    pub fn new(inner: Arc<dyn GenericMscResolver>) -> Self {
        Self { inner }
    }

    /// Creates the resolver selected in the configuration.
    pub fn from_config(config: &Config) -> Res<Self> {
        match config.msc_resolver {
            ResolverKind::Github => Self::github(config),
            ResolverKind::Static => Ok(Self::fixed()),
        }
    }

    /// Creates a resolver that only uses the link template.
    pub fn fixed() -> Self {
        Self { inner: Arc::new(StaticMscResolver) }
    }
}

// Specific implementations.

/// Resolver that performs no lookups; every reference is shown as a plain link.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticMscResolver;

#[async_trait]
impl GenericMscResolver for StaticMscResolver {
    async fn resolve(&self, reference: &MscReference) -> Res<Option<Msc>> {
        Ok(Some(Msc::from(reference.clone())))
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_resolver_keeps_reference() {
        let resolver = MscResolver::fixed();
        let reference = MscReference {
            id: 2477,
            url: "https://example.org/issues/2477".to_string(),
        };

        let msc = resolver.resolve(&reference).await.unwrap().unwrap();

        assert_eq!(msc.reference, reference);
        assert_eq!(msc.title, None);
        assert_eq!(msc.author, None);
    }
}
