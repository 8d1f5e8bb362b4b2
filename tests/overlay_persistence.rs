//! # Overlay Persistence Tests
//!
//! Records overlaid on mapped views, end to end:
//!
//! 1. A batch of 100 twenty-byte records written at a view's base sums back
//!    to the values written
//! 2. Reopening a file-backed store and re-overlaying the same offset shows
//!    identical values and rewrites no header or payload byte
//! 3. Tag fixup on copy-on-write views never writes when tags already match
//! 4. Arrays created in a mapping are recognized by the registry after reopen

use slidemap::config::{HEADER_WORD, KB, MB};
use slidemap::{
    BackingStore, MapError, MmapAllocator, Protection, Record, TypeRegistry, Window, WindowConfig,
};
use tempfile::tempdir;
use zerocopy::little_endian::{F64, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

const TRADE_COUNT: usize = 100;

#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
struct Trade {
    id: U32,
    price: F64,
    quantity: U64,
}

impl Trade {
    fn id(&self) -> u32 {
        self.id.get()
    }

    fn set_id(&mut self, val: u32) {
        self.id = U32::new(val);
    }

    fn price(&self) -> f64 {
        self.price.get()
    }

    fn set_price(&mut self, val: f64) {
        self.price = F64::new(val);
    }

    fn quantity(&self) -> u64 {
        self.quantity.get()
    }

    fn set_quantity(&mut self, val: u64) {
        self.quantity = U64::new(val);
    }
}

impl Record for Trade {
    const NAME: &'static str = "Trade";
}

const _: () = assert!(std::mem::size_of::<Trade>() == 20);

fn quantity_of(i: usize) -> u64 {
    (i as u64 + 1) * 3
}

mod scenario {
    use super::*;

    #[test]
    fn hundred_trades_in_anonymous_store_sum_correctly() {
        let store = BackingStore::anonymous(MB).unwrap();
        let mut window = Window::new(&store, WindowConfig::new()).unwrap();
        window.remap_to(0, 64 * KB).unwrap();

        let mut registry = TypeRegistry::new();
        let trades = registry.overlay::<Trade>().unwrap();

        let alloc = MmapAllocator::new(window.view_mut().unwrap());
        let mut batch = trades.create_many(&alloc, TRADE_COUNT).unwrap();
        let mut expected = 0u64;
        for i in 0..TRADE_COUNT {
            let trade = &mut batch[i];
            trade.set_id(i as u32);
            trade.set_price(100.0 + i as f64 / 4.0);
            trade.set_quantity(quantity_of(i));
            expected += quantity_of(i);
        }

        assert_eq!(alloc.used(), trades.block_len(TRADE_COUNT).unwrap());
        assert_eq!(batch.iter().map(Trade::quantity).sum::<u64>(), expected);
        assert_eq!(batch[42].id(), 42);
        assert_eq!(batch[99].price(), 100.0 + 99.0 / 4.0);
    }
}

mod reopen {
    use super::*;

    fn write_trades(path: &std::path::Path) -> Vec<u8> {
        let store = BackingStore::open(path, MB).unwrap();
        let mut window = Window::new(&store, WindowConfig::new()).unwrap();
        let trades = slidemap::Overlay::<Trade>::new().unwrap();
        let len = trades.block_len(TRADE_COUNT).unwrap();

        {
            let view = window.view_mut().unwrap();
            let mut batch = trades.as_random_access(&mut view[..len], TRADE_COUNT).unwrap();
            for (i, trade) in batch.iter_mut().enumerate() {
                trade.set_id(i as u32);
                trade.set_quantity(quantity_of(i));
            }
        }

        window.flush().unwrap();
        window.view().unwrap()[..len].to_vec()
    }

    #[test]
    fn reopened_store_reproduces_values_without_rewrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trades.bin");
        let written = write_trades(&path);

        let store = BackingStore::open(&path, 0).unwrap();
        let mut window = Window::new(&store, WindowConfig::new()).unwrap();
        let trades = slidemap::Overlay::<Trade>::new().unwrap();
        let len = trades.block_len(TRADE_COUNT).unwrap();

        let view = window.view_mut().unwrap();
        let mut seq = trades.as_sequence(&mut view[..len], TRADE_COUNT).unwrap();
        let sum: u64 = seq.iter_mut().map(|t| t.quantity()).sum();
        let stats = seq.last_fixup().unwrap();

        assert_eq!(sum, (0..TRADE_COUNT).map(quantity_of).sum::<u64>());
        assert_eq!(stats.visited, TRADE_COUNT);
        assert_eq!(stats.rewritten, 0);
        assert_eq!(&view[..len], written.as_slice());
    }

    #[test]
    fn read_only_reopen_verifies_tags() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trades.bin");
        write_trades(&path);

        let store = BackingStore::open(&path, 0).unwrap();
        let window = Window::new(&store, WindowConfig::new().read_only()).unwrap();
        let trades = slidemap::Overlay::<Trade>::new().unwrap();
        let view = window.view().unwrap();

        for i in 0..TRADE_COUNT {
            let trade = trades.overlay_ref(&view[i * trades.stride()..]).unwrap();
            assert_eq!(trade.id(), i as u32);
        }

        let past_end = trades.overlay_ref(&view[TRADE_COUNT * trades.stride()..]);
        assert!(matches!(
            past_end.unwrap_err().downcast_ref::<MapError>(),
            Some(MapError::TagMismatch { .. })
        ));
    }

    #[test]
    fn copy_on_write_overlay_keeps_file_intact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trades.bin");
        let written = write_trades(&path);

        let store = BackingStore::open(&path, 0).unwrap();
        {
            let mut window = Window::new(
                &store,
                WindowConfig::new().protection(Protection::WriteCopy),
            )
            .unwrap();
            let trades = slidemap::Overlay::<Trade>::new().unwrap();
            let len = trades.block_len(TRADE_COUNT).unwrap();
            let view = window.view_mut().unwrap();
            let mut batch = trades.as_random_access(&mut view[..len], TRADE_COUNT).unwrap();

            batch[0].set_quantity(0);
            assert_eq!(batch[0].quantity(), 0);
        }

        let window = Window::new(&store, WindowConfig::new().read_only()).unwrap();
        assert_eq!(&window.view().unwrap()[..written.len()], written.as_slice());
    }
}

mod arrays {
    use super::*;

    #[test]
    fn registry_identifies_array_after_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("samples.bin");

        {
            let store = BackingStore::open(&path, MB).unwrap();
            let mut window = Window::new(&store, WindowConfig::new()).unwrap();
            let samples = slidemap::ArrayOverlay::<u32>::new().unwrap();
            let alloc = MmapAllocator::new(window.view_mut().unwrap());

            let mut array = samples.create_array(&alloc, 64).unwrap();
            for (i, slot) in array.iter_mut().enumerate() {
                *slot = (i * i) as u32;
            }
            assert!(array.get(64).is_err());
            drop(array);
            drop(alloc);

            window.flush().unwrap();
        }

        let store = BackingStore::open(&path, 0).unwrap();
        let mut window = Window::new(&store, WindowConfig::new()).unwrap();
        let mut registry = TypeRegistry::new();
        registry.overlay::<Trade>().unwrap();
        let samples = registry.array_overlay::<u32>().unwrap();

        let view = window.view_mut().unwrap();
        let schema = registry.identify(view).unwrap();
        assert_eq!(schema.tag(), samples.tag());

        let array = samples.overlay(&mut view[..samples.block_len(64).unwrap()]).unwrap();
        assert_eq!(array.len(), 64);
        assert_eq!(array.as_slice()[9], 81);
        drop(array);

        assert_eq!(&view[..HEADER_WORD], &64usize.to_ne_bytes(), "count word leads the header");
    }
}
