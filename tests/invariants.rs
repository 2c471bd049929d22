//! Randomized coverage for two invariants that must hold under any
//! interleaving of creates and destroys: row ids stay unique and
//! strictly increasing in creation order, and `_offset` stays a dense
//! `{0, .., n-1}` permutation over the live rows. Mirrors the
//! random-order harness in our teacher's own `src/test.rs`
//! (`rand::thread_rng()` + `rng.gen::<usize>() % len`).

use std::collections::HashSet;
use std::sync::Once;

use flatbase::column::ColumnKind;
use flatbase::database::Database;
use flatbase::table::TableBuilder;
use flatbase::value::Value;
use flatbase::RowId;
use rand::Rng;

static INIT_LOGGER: Once = Once::new();

fn init_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

#[test]
fn random_create_destroy_sequence_preserves_id_and_offset_invariants() {
    init_logging();

    let dir = tempfile::tempdir().unwrap();
    let def = TableBuilder::new("T").column("n", ColumnKind::Int).build().unwrap();
    let mut db = Database::connect(dir.path(), vec![def]).unwrap();
    let t = db.table_mut("T").unwrap();

    let mut rng = rand::thread_rng();
    let mut live: Vec<RowId> = Vec::new();
    let mut last_id = 0i32;

    for step in 0..500 {
        let create = live.is_empty() || rng.gen::<usize>() % 3 != 0;
        if create {
            let id = t.create_row();
            t.set(id, "n", Value::Int((rng.gen::<u32>() % 2000) as i32 - 1000))
                .unwrap();
            log::debug!("step {step}: created row {}", id.0);
            assert!(id.0 > last_id, "ids must be strictly increasing per creation order");
            last_id = id.0;
            live.push(id);
        } else {
            let pick = rng.gen::<usize>() % live.len();
            let id = live.swap_remove(pick);
            t.destroy_row(id).unwrap();
            log::debug!("step {step}: destroyed row {}", id.0);
        }

        let mut offsets = t.live_offsets();
        offsets.sort_unstable();
        let expected: Vec<usize> = (0..live.len()).collect();
        assert_eq!(offsets, expected, "offsets must stay a dense [0, n) permutation");

        let mut seen_ids = HashSet::new();
        for rid in t.row_ids() {
            assert!(seen_ids.insert(rid.0), "row ids must be unique among live rows");
        }
        assert_eq!(seen_ids.len(), live.len());
    }
}
