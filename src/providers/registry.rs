use super::core::{
    ContextResolver, ExceptionMapper, MessageBodyReader, MessageBodyWriter, ProviderKind,
    ProviderRecord,
};
use crate::entity::{Entity, EntityType};
use crate::error::{ErrorClass, ProviderSelectionError, ResourceError};
use crate::media::MediaType;
use crate::metadata::Instance;
use arc_swap::ArcSwap;
use dashmap::DashMap;
use http::HeaderMap;
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

/// Priority for providers registered without one.
pub const DEFAULT_PRIORITY: f64 = 0.5;
/// Priority for built-in providers.
pub const SYSTEM_PRIORITY: f64 = 0.1;

/// Distinct media types whose candidate lists a snapshot keeps.
const CANDIDATE_CACHE_LIMIT: usize = 256;

struct Registered<P: ?Sized> {
    provider: Arc<P>,
    media_types: Vec<MediaType>,
    priority: f64,
    seq: u64,
    name: &'static str,
}

impl<P: ?Sized> Registered<P> {
    /// Specificity of the most specific declared type compatible with
    /// `requested`; `None` when no declared type is.
    fn match_specificity(&self, requested: &MediaType) -> Option<u8> {
        if self.media_types.is_empty() {
            return Some(0);
        }
        self.media_types
            .iter()
            .filter(|declared| declared.is_compatible(requested))
            .map(MediaType::specificity)
            .max()
    }
}

struct MapperEntry {
    class: ErrorClass,
    mapper: Arc<dyn ExceptionMapper>,
    priority: f64,
    seq: u64,
}

struct ResolverEntry {
    ty: EntityType,
    resolver: Registered<dyn ContextResolver>,
}

type ReaderCandidates = Arc<Vec<Arc<Registered<dyn MessageBodyReader>>>>;
type WriterCandidates = Arc<Vec<Arc<Registered<dyn MessageBodyWriter>>>>;

/// One published generation of providers.
///
/// Candidate caches live in the snapshot they were computed from, so a
/// registration that swaps in new tables also starts from empty caches.
#[derive(Default)]
struct ProviderTables {
    readers: Vec<Arc<Registered<dyn MessageBodyReader>>>,
    writers: Vec<Arc<Registered<dyn MessageBodyWriter>>>,
    mappers: Vec<Arc<MapperEntry>>,
    resolvers: Vec<Arc<ResolverEntry>>,
    reader_cache: DashMap<String, ReaderCandidates>,
    writer_cache: DashMap<String, WriterCandidates>,
}

impl ProviderTables {
    fn duplicate(&self) -> Self {
        Self {
            readers: self.readers.clone(),
            writers: self.writers.clone(),
            mappers: self.mappers.clone(),
            resolvers: self.resolvers.clone(),
            reader_cache: DashMap::new(),
            writer_cache: DashMap::new(),
        }
    }
}

/// Look up or compute the candidates for `media_type`. Parameters never
/// affect compatibility, so entries are keyed by essence.
fn cached_candidates<P: ?Sized>(
    cache: &DashMap<String, Arc<Vec<Arc<Registered<P>>>>>,
    entries: &[Arc<Registered<P>>],
    media_type: &MediaType,
) -> Arc<Vec<Arc<Registered<P>>>> {
    let key = media_type.essence();
    if let Some(hit) = cache.get(&key) {
        return Arc::clone(hit.value());
    }
    let ordered = Arc::new(order_candidates(entries, media_type));
    if cache.len() < CANDIDATE_CACHE_LIMIT {
        cache.insert(key, Arc::clone(&ordered));
    }
    ordered
}

/// Priority-ordered registry of entity providers, exception mappers and
/// context resolvers.
///
/// Lookups read an immutable snapshot through [`ArcSwap`] and never block;
/// registration copies the tables under a writer lock and swaps them in.
/// Reader and writer candidate lists are cached per requested media type
/// inside each snapshot, up to a fixed number of types.
pub struct ProvidersRegistry {
    tables: ArcSwap<ProviderTables>,
    write_lock: Mutex<()>,
    seq: AtomicU64,
    default_priority: f64,
    system_priority: f64,
}

impl Default for ProvidersRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvidersRegistry {
    /// An empty registry with the default priorities.
    #[must_use]
    pub fn new() -> Self {
        Self::with_priorities(DEFAULT_PRIORITY, SYSTEM_PRIORITY)
    }

    #[must_use]
    pub fn with_priorities(default_priority: f64, system_priority: f64) -> Self {
        Self {
            tables: ArcSwap::from_pointee(ProviderTables::default()),
            write_lock: Mutex::new(()),
            seq: AtomicU64::new(0),
            default_priority,
            system_priority,
        }
    }

    /// A registry preloaded with the built-in providers.
    #[must_use]
    pub fn with_builtins(default_priority: f64, system_priority: f64) -> Self {
        let registry = Self::with_priorities(default_priority, system_priority);
        for record in super::builtin::builtin_providers() {
            registry.add_system_provider(record);
        }
        registry
    }

    /// Register a provider at its declared priority, or the default one.
    pub fn add_provider(&self, record: ProviderRecord) -> u64 {
        let priority = record.priority.unwrap_or(self.default_priority);
        self.insert(record, priority)
    }

    /// Register a provider at system priority.
    pub fn add_system_provider(&self, record: ProviderRecord) -> u64 {
        let priority = record.priority.unwrap_or(self.system_priority);
        self.insert(record, priority)
    }

    fn insert(&self, record: ProviderRecord, priority: f64) -> u64 {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
        let name = record.provider_type.name();
        let kind = record.kind.name();
        let mut tables = self.tables.load().duplicate();

        match record.kind {
            ProviderKind::Reader(provider) => tables.readers.push(Arc::new(Registered {
                provider,
                media_types: record.media_types,
                priority,
                seq,
                name,
            })),
            ProviderKind::Writer(provider) => tables.writers.push(Arc::new(Registered {
                provider,
                media_types: record.media_types,
                priority,
                seq,
                name,
            })),
            ProviderKind::ExceptionMapper(class, mapper) => {
                tables.mappers.push(Arc::new(MapperEntry {
                    class,
                    mapper,
                    priority,
                    seq,
                }))
            }
            ProviderKind::ContextResolver(ty, provider) => {
                tables.resolvers.push(Arc::new(ResolverEntry {
                    ty,
                    resolver: Registered {
                        provider,
                        media_types: record.media_types,
                        priority,
                        seq,
                        name,
                    },
                }))
            }
        }

        self.tables.store(Arc::new(tables));
        debug!(provider = name, kind, priority, seq, "Provider registered");
        seq
    }

    /// Drop every provider, built-ins included.
    pub fn clear(&self) {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.tables.store(Arc::new(ProviderTables::default()));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        let tables = self.tables.load();
        tables.readers.len() + tables.writers.len() + tables.mappers.len() + tables.resolvers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn reader_candidates(&self, media_type: &MediaType) -> ReaderCandidates {
        let tables = self.tables.load();
        cached_candidates(&tables.reader_cache, &tables.readers, media_type)
    }

    fn writer_candidates(&self, media_type: &MediaType) -> WriterCandidates {
        let tables = self.tables.load();
        cached_candidates(&tables.writer_cache, &tables.writers, media_type)
    }

    #[cfg(test)]
    fn cached_media_types(&self) -> (usize, usize) {
        let tables = self.tables.load();
        (tables.reader_cache.len(), tables.writer_cache.len())
    }

    /// First reader, in specificity then priority order, that accepts `ty`.
    #[must_use]
    pub fn get_message_body_reader(
        &self,
        ty: EntityType,
        annotations: &[&'static str],
        media_type: &MediaType,
    ) -> Option<Arc<dyn MessageBodyReader>> {
        self.reader_candidates(media_type)
            .iter()
            .find(|entry| {
                let readable = entry.provider.is_readable(ty, annotations, media_type);
                trace!(reader = entry.name, entity = ty.name(), readable, "Probed reader");
                readable
            })
            .map(|entry| Arc::clone(&entry.provider))
    }

    /// First writer, in specificity then priority order, that accepts `ty`.
    #[must_use]
    pub fn get_message_body_writer(
        &self,
        ty: EntityType,
        annotations: &[&'static str],
        media_type: &MediaType,
    ) -> Option<Arc<dyn MessageBodyWriter>> {
        self.writer_candidates(media_type)
            .iter()
            .find(|entry| {
                let writeable = entry.provider.is_writeable(ty, annotations, media_type);
                trace!(writer = entry.name, entity = ty.name(), writeable, "Probed writer");
                writeable
            })
            .map(|entry| Arc::clone(&entry.provider))
    }

    /// Mapper for the closest class in the error's lineage.
    #[must_use]
    pub fn get_exception_mapper(&self, error: &ResourceError) -> Option<Arc<dyn ExceptionMapper>> {
        error
            .lineage()
            .find_map(|class| self.get_exception_mapper_for(class))
    }

    /// Highest-priority mapper registered for exactly `class`.
    #[must_use]
    pub fn get_exception_mapper_for(&self, class: ErrorClass) -> Option<Arc<dyn ExceptionMapper>> {
        let tables = self.tables.load();
        tables
            .mappers
            .iter()
            .filter(|m| m.class == class)
            .min_by(|a, b| {
                b.priority
                    .total_cmp(&a.priority)
                    .then_with(|| a.seq.cmp(&b.seq))
            })
            .map(|m| Arc::clone(&m.mapper))
    }

    /// First compatible resolver registered for `ty`.
    #[must_use]
    pub fn get_context_resolver(
        &self,
        ty: EntityType,
        media_type: &MediaType,
    ) -> Option<Arc<dyn ContextResolver>> {
        self.resolvers_for(ty, media_type)
            .into_iter()
            .next()
            .map(|entry| Arc::clone(&entry.resolver.provider))
    }

    /// Ask every compatible resolver for `ty` in order; the first answer wins.
    #[must_use]
    pub fn get_context(&self, ty: EntityType, media_type: &MediaType) -> Option<Instance> {
        self.resolvers_for(ty, media_type)
            .iter()
            .find_map(|entry| entry.resolver.provider.get_context(ty))
    }

    fn resolvers_for(&self, ty: EntityType, media_type: &MediaType) -> Vec<Arc<ResolverEntry>> {
        let tables = self.tables.load();
        let mut matching: Vec<(u8, Arc<ResolverEntry>)> = tables
            .resolvers
            .iter()
            .filter(|entry| entry.ty == ty)
            .filter_map(|entry| {
                entry
                    .resolver
                    .match_specificity(media_type)
                    .map(|spec| (spec, Arc::clone(entry)))
            })
            .collect();
        matching.sort_by(|(sa, a), (sb, b)| {
            compare_entries(*sa, &a.resolver, *sb, &b.resolver)
        });
        matching.into_iter().map(|(_, entry)| entry).collect()
    }

    /// Read an entity of type `ty` from `body`.
    pub fn read_entity(
        &self,
        ty: EntityType,
        annotations: &[&'static str],
        media_type: &MediaType,
        headers: &HeaderMap,
        body: &mut dyn Read,
    ) -> Result<Entity, ResourceError> {
        let reader = self
            .get_message_body_reader(ty, annotations, media_type)
            .ok_or_else(|| ProviderSelectionError::NoReader {
                entity_type: ty.name(),
                media_type: media_type.clone(),
            })?;
        reader.read_from(ty, annotations, media_type, headers, body)
    }

    /// Serialize `entity` as `media_type`.
    pub fn write_entity(
        &self,
        entity: &Entity,
        annotations: &[&'static str],
        media_type: &MediaType,
        headers: &mut HeaderMap,
    ) -> Result<Vec<u8>, ResourceError> {
        let ty = entity.entity_type();
        let writer = self
            .get_message_body_writer(ty, annotations, media_type)
            .ok_or_else(|| ProviderSelectionError::NoWriter {
                entity_type: ty.name(),
                media_type: media_type.clone(),
            })?;
        let capacity = writer
            .size(entity, media_type)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(256);
        let mut body = Vec::with_capacity(capacity);
        writer.write_to(entity, annotations, media_type, headers, &mut body)?;
        Ok(body)
    }

    /// Declared media types of every writer able to write `ty`, in writer
    /// order. Writers declaring nothing contribute `*/*`.
    #[must_use]
    pub fn writer_media_types(&self, ty: EntityType) -> Vec<MediaType> {
        let wildcard = MediaType::wildcard();
        let mut found: Vec<MediaType> = Vec::new();
        for entry in self.writer_candidates(&wildcard).iter() {
            let declared: Vec<MediaType> = if entry.media_types.is_empty() {
                vec![wildcard.clone()]
            } else {
                entry.media_types.clone()
            };
            for mt in declared {
                if entry.provider.is_writeable(ty, &[], &mt) && !found.contains(&mt) {
                    found.push(mt);
                }
            }
        }
        found
    }
}

impl Debug for ProvidersRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvidersRegistry")
            .field("providers", &self.len())
            .finish()
    }
}

fn order_candidates<P: ?Sized>(
    entries: &[Arc<Registered<P>>],
    media_type: &MediaType,
) -> Vec<Arc<Registered<P>>> {
    let mut matching: Vec<(u8, &Arc<Registered<P>>)> = entries
        .iter()
        .filter_map(|entry| entry.match_specificity(media_type).map(|spec| (spec, entry)))
        .collect();
    matching.sort_by(|(sa, a), (sb, b)| compare_entries(*sa, a, *sb, b));
    matching.into_iter().map(|(_, e)| Arc::clone(e)).collect()
}

/// More specific first, then higher priority, then earlier registration.
fn compare_entries<P: ?Sized>(
    spec_a: u8,
    a: &Registered<P>,
    spec_b: u8,
    b: &Registered<P>,
) -> Ordering {
    spec_b
        .cmp(&spec_a)
        .then_with(|| b.priority.total_cmp(&a.priority))
        .then_with(|| a.seq.cmp(&b.seq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::Response;
    use http::StatusCode;
    use std::io::Write;

    struct Tagged(&'static str);

    impl MessageBodyWriter for Tagged {
        fn is_writeable(&self, ty: EntityType, _: &[&'static str], _: &MediaType) -> bool {
            ty.is::<String>()
        }

        fn write_to(
            &self,
            _: &Entity,
            _: &[&'static str],
            _: &MediaType,
            _: &mut HeaderMap,
            out: &mut dyn Write,
        ) -> Result<(), ResourceError> {
            out.write_all(self.0.as_bytes())?;
            Ok(())
        }
    }

    fn written(registry: &ProvidersRegistry, media_type: &str) -> String {
        let mt = MediaType::parse(media_type).unwrap();
        let body = registry
            .write_entity(
                &Entity::new(String::new()),
                &[],
                &mt,
                &mut HeaderMap::new(),
            )
            .unwrap();
        String::from_utf8(body).unwrap()
    }

    #[test]
    fn higher_priority_wins_for_equal_media_types() {
        let registry = ProvidersRegistry::new();
        registry.add_provider(
            ProviderRecord::writer(Tagged("low"))
                .media_types(&["text/plain"])
                .priority(1.0),
        );
        registry.add_provider(
            ProviderRecord::writer(Tagged("high"))
                .media_types(&["text/plain"])
                .priority(2.0),
        );
        assert_eq!(written(&registry, "text/plain"), "high");
    }

    #[test]
    fn specificity_beats_priority() {
        let registry = ProvidersRegistry::new();
        registry.add_provider(ProviderRecord::writer(Tagged("any")).priority(9.0));
        registry.add_provider(
            ProviderRecord::writer(Tagged("plain"))
                .media_types(&["text/plain"])
                .priority(0.1),
        );
        assert_eq!(written(&registry, "text/plain"), "plain");
        assert_eq!(written(&registry, "application/xml"), "any");
    }

    #[test]
    fn cache_is_invalidated_on_registration() {
        let registry = ProvidersRegistry::new();
        registry.add_provider(ProviderRecord::writer(Tagged("first")));
        assert_eq!(written(&registry, "text/plain"), "first");
        registry.add_provider(
            ProviderRecord::writer(Tagged("second")).media_types(&["text/plain"]),
        );
        assert_eq!(written(&registry, "text/plain"), "second");
    }

    #[test]
    fn cache_keys_ignore_media_type_parameters() {
        let registry = ProvidersRegistry::new();
        registry.add_provider(ProviderRecord::writer(Tagged("plain")).media_types(&["text/plain"]));
        for i in 0..500 {
            assert_eq!(written(&registry, &format!("text/plain; boundary=b{i}")), "plain");
        }
        assert_eq!(registry.cached_media_types().1, 1);
    }

    #[test]
    fn cache_stops_growing_at_its_limit() {
        let registry = ProvidersRegistry::new();
        registry.add_provider(ProviderRecord::writer(Tagged("any")));
        for i in 0..CANDIDATE_CACHE_LIMIT + 50 {
            assert_eq!(written(&registry, &format!("application/x-kind{i}")), "any");
        }
        assert_eq!(registry.cached_media_types().1, CANDIDATE_CACHE_LIMIT);
    }

    #[test]
    fn registration_publishes_empty_caches() {
        let registry = ProvidersRegistry::new();
        registry.add_provider(ProviderRecord::writer(Tagged("first")));
        let before = registry.writer_candidates(&MediaType::text_plain());
        assert_eq!(registry.cached_media_types().1, 1);

        registry.add_provider(ProviderRecord::writer(Tagged("second")).media_types(&["text/plain"]));
        assert_eq!(registry.cached_media_types(), (0, 0));
        // A list computed from the old snapshot never reaches the new one.
        assert_eq!(before.len(), 1);
        assert_eq!(registry.writer_candidates(&MediaType::text_plain()).len(), 2);
    }

    #[test]
    fn missing_writer_is_a_selection_error() {
        let registry = ProvidersRegistry::new();
        let err = registry
            .write_entity(
                &Entity::new(1_u8),
                &[],
                &MediaType::application_json(),
                &mut HeaderMap::new(),
            )
            .unwrap_err();
        assert!(err.is::<ProviderSelectionError>());
    }

    #[derive(Debug, thiserror::Error)]
    #[error("gone")]
    struct Gone;

    struct Lookup;

    #[test]
    fn exception_mapper_walks_lineage() {
        let registry = ProvidersRegistry::new();
        registry.add_provider(ProviderRecord::exception_mapper::<Lookup, _>(
            |_: &ResourceError| Response::new(StatusCode::NOT_FOUND),
        ));
        let mapped = ResourceError::new(Gone).with_ancestor::<Lookup>();
        let mapper = registry.get_exception_mapper(&mapped).unwrap();
        assert_eq!(mapper.to_response(&mapped).status(), StatusCode::NOT_FOUND);
        assert!(registry.get_exception_mapper(&ResourceError::new(Gone)).is_none());
    }
}
