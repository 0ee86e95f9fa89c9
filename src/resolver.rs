//! Resolution of absolute addresses to `function+offset` locations.

use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::path::PathBuf;

use crate::maps::Segment;
use crate::symtab::SymTabCache;
use crate::tools::SymSource;
use crate::Addr;


/// The resolved location of one queried address.
///
/// Absent fields are sentinels, not errors: `path` is `None` only when
/// no segment contained the address at all, while `func` and `offset`
/// stay `None` whenever no symbol bracketed the address within its
/// segment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resolved {
    /// The name of the function containing the address.
    pub func: Option<String>,
    /// The address' offset from the start of that function.
    pub offset: Option<Addr>,
    /// The path of the file whose segment contains the address.
    pub path: Option<PathBuf>,
}

impl Display for Resolved {
    /// Render as `<func>+0x<offset> in <path>`, with `?` standing in
    /// for any unresolved field.
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let func = self.func.as_deref().unwrap_or("?");
        let () = match self.offset {
            Some(offset) => write!(f, "{func}+{offset:#x}")?,
            None => write!(f, "{func}+0x?")?,
        };
        match &self.path {
            Some(path) => write!(f, " in {}", path.display()),
            None => write!(f, " in ?"),
        }
    }
}


/// A resolver of absolute addresses against one process' executable
/// segments.
///
/// Symbol tables are loaded through `S` on first use and cached per
/// path; constructing multiple resolvers yields fully independent
/// caches.
#[derive(Debug)]
pub struct Resolver<S> {
    segments: Vec<Segment>,
    cache: SymTabCache,
    source: S,
}

impl<S> Resolver<S>
where
    S: SymSource,
{
    /// Create a resolver over the provided segments, loading symbol
    /// data through `source`.
    pub fn new(segments: Vec<Segment>, source: S) -> Self {
        Self {
            segments,
            cache: SymTabCache::new(),
            source,
        }
    }

    /// Resolve a single absolute address.
    ///
    /// The first segment (in stored order) containing the address is
    /// selected; ties between overlapping ranges go to list order. The
    /// nearest symbol strictly below the segment-relative offset wins,
    /// provided the next symbol lies strictly above it.
    pub fn resolve(&self, addr: Addr) -> Resolved {
        for segment in &self.segments {
            if !segment.contains(addr) {
                continue
            }
            let file_offset = addr - segment.range.start;
            let tab = self.cache.get_or_load(&segment.path, &self.source);

            let mut resolved = Resolved {
                func: None,
                offset: None,
                path: Some(segment.path.clone()),
            };
            if let Some((name, sym_offset)) = tab.find_sym(file_offset) {
                resolved.func = Some(name.to_string());
                resolved.offset = Some(file_offset - sym_offset);
            }
            return resolved
        }
        Resolved::default()
    }

    /// Resolve a sequence of addresses elementwise, preserving input
    /// order (no deduplication).
    pub fn resolve_all(&self, addrs: &[Addr]) -> Vec<Resolved> {
        addrs.iter().map(|addr| self.resolve(*addr)).collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Result;
    use std::path::Path;

    use test_log::test;


    /// A canned symbol source covering two fake binaries.
    struct Fixture;

    impl SymSource for Fixture {
        fn program_headers(&self, path: &Path) -> Result<String> {
            let listing = match path.to_str() {
                Some("/usr/bin/app") => "LOAD 0x0 0x1000 0x1000 0x500 0x500 R E 0x1000",
                // Non-PIE style: high vaddr, still page aligned.
                Some("/usr/lib/libfoo.so") => "LOAD 0x0 0x400640 0x400640 0x500 0x500 R E 0x1000",
                _ => "",
            };
            Ok(listing.to_string())
        }

        fn text_symbols(&self, path: &Path) -> Result<String> {
            let listing = match path.to_str() {
                Some("/usr/bin/app") => "0000000000001040 <start>:\n0000000000001100 <work>:\n",
                Some("/usr/lib/libfoo.so") => "0000000000400700 <foo_alloc>:\n",
                _ => "",
            };
            Ok(listing.to_string())
        }
    }

    fn fixture_resolver() -> Resolver<Fixture> {
        let segments = vec![
            Segment {
                range: 0x55000000..0x55001000,
                path: PathBuf::from("/usr/bin/app"),
            },
            Segment {
                range: 0x7f000000..0x7f004000,
                path: PathBuf::from("/usr/lib/libfoo.so"),
            },
        ];
        Resolver::new(segments, Fixture)
    }

    /// Any address inside a segment resolves to that segment's path.
    #[test]
    fn containing_segment_determines_path() {
        let resolver = fixture_resolver();

        let resolved = resolver.resolve(0x55000041);
        assert_eq!(resolved.path.as_deref(), Some(Path::new("/usr/bin/app")));

        let resolved = resolver.resolve(0x7f000301);
        assert_eq!(
            resolved.path.as_deref(),
            Some(Path::new("/usr/lib/libfoo.so"))
        );
    }

    /// `app` has bias 0x1000, so `<start>` sits at file offset 0x40
    /// and `<work>` at 0x100.
    #[test]
    fn function_and_offset_resolution() {
        let resolver = fixture_resolver();

        let resolved = resolver.resolve(0x55000041);
        assert_eq!(resolved.func.as_deref(), Some("start"));
        assert_eq!(resolved.offset, Some(0x1));

        let resolved = resolver.resolve(0x550000ff);
        assert_eq!(resolved.func.as_deref(), Some("start"));
        assert_eq!(resolved.offset, Some(0xbf));

        let resolved = resolver.resolve(0x55000101);
        assert_eq!(resolved.func.as_deref(), Some("work"));
        assert_eq!(resolved.offset, Some(0x1));

        // libfoo: bias 0x400000, `foo_alloc` at file offset 0x700.
        let resolved = resolver.resolve(0x7f000701);
        assert_eq!(resolved.func.as_deref(), Some("foo_alloc"));
        assert_eq!(resolved.offset, Some(0x1));
    }

    /// An address below the first symbol keeps the path but yields the
    /// `?` sentinel for function and offset.
    #[test]
    fn no_bracketing_symbol_keeps_path() {
        let resolver = fixture_resolver();
        let resolved = resolver.resolve(0x55000010);
        assert_eq!(resolved.func, None);
        assert_eq!(resolved.offset, None);
        assert_eq!(resolved.path.as_deref(), Some(Path::new("/usr/bin/app")));
        assert_eq!(resolved.to_string(), "?+0x? in /usr/bin/app");
    }

    /// An address outside every segment yields the fully unresolved
    /// sentinel.
    #[test]
    fn unmapped_address_is_fully_unresolved() {
        let resolver = fixture_resolver();
        let resolved = resolver.resolve(0xdead0000);
        assert_eq!(resolved, Resolved::default());
        assert_eq!(resolved.to_string(), "?+0x? in ?");
    }

    /// Results come back in input order, one per input, duplicates
    /// included.
    #[test]
    fn elementwise_resolution_preserves_order() {
        let resolver = fixture_resolver();
        let resolved = resolver.resolve_all(&[0x55000101, 0xdead0000, 0x55000101]);
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[0].func.as_deref(), Some("work"));
        assert_eq!(resolved[1], Resolved::default());
        assert_eq!(resolved[0], resolved[2]);
    }

    #[test]
    fn display_rendering() {
        let resolved = Resolved {
            func: Some("malloc".to_string()),
            offset: Some(0x1f),
            path: Some(PathBuf::from("/usr/lib64/libc.so.6")),
        };
        assert_eq!(resolved.to_string(), "malloc+0x1f in /usr/lib64/libc.so.6");
    }
}
