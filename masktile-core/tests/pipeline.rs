//! End-to-end behaviour of the tag mask pipeline: vector data in,
//! per-tag rasters and an emptiness verdict out.

use geo::Coord;
use masktile_core::tile::geodetic;
use masktile_core::{
    MaskBuilder, MaskMode, Relation, RelationMember, TagQuery, Tags, Tile, TileVerdict,
    VectorData, Way,
};

const SIZE: u32 = 256;

fn sample_tile() -> Tile {
    Tile::at(47.2231, 8.8188, 18)
}

fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

/// A way whose nodes project onto the given local pixel positions.
fn way_at_pixels(id: i64, tags: Tags, pixels: &[(f64, f64)], tile: Tile) -> Way {
    let (ox, oy) = tile.pixel_origin(SIZE);
    let points = pixels
        .iter()
        .map(|&(x, y)| {
            let (lat, lon) = geodetic(ox + x, oy + y, tile.zoom, SIZE);
            Coord { x: lon, y: lat }
        })
        .collect();
    Way { id, tags, points }
}

fn courtyard_building(tile: Tile) -> VectorData {
    let building = tags(&[("building", "yes")]);
    VectorData {
        ways: vec![
            way_at_pixels(
                1,
                building.clone(),
                &[(40.0, 40.0), (120.0, 40.0), (120.0, 120.0), (40.0, 120.0), (40.0, 40.0)],
                tile,
            ),
            way_at_pixels(
                2,
                Tags::new(),
                &[(70.0, 70.0), (90.0, 70.0), (90.0, 90.0), (70.0, 90.0), (70.0, 70.0)],
                tile,
            ),
        ],
        relations: vec![Relation {
            id: 10,
            tags: building,
            members: vec![
                RelationMember { way: 1, role: "outer".to_owned() },
                RelationMember { way: 2, role: "inner".to_owned() },
            ],
        }],
    }
}

#[test]
fn building_with_courtyard_renders_an_annulus() {
    let tile = sample_tile();
    let builder = MaskBuilder::new(SIZE, MaskMode::Merged);
    let masks = builder.build(
        &courtyard_building(tile),
        tile,
        &[TagQuery::parse("building")],
    );

    assert_eq!(masks.verdict(), TileVerdict::NonEmpty);
    let mask = &masks.masks["building"];
    assert_eq!(mask.get(50, 80), 255, "annulus must be labelled");
    assert_eq!(mask.get(80, 80), 0, "courtyard must stay background");
    assert_eq!(mask.get(10, 10), 0, "outside must stay background");
}

#[test]
fn no_matching_features_yields_empty_verdict() {
    let tile = sample_tile();
    let builder = MaskBuilder::new(SIZE, MaskMode::Merged);
    let masks = builder.build(
        &courtyard_building(tile),
        tile,
        &[TagQuery::parse("landuse")],
    );
    assert_eq!(masks.verdict(), TileVerdict::Empty);
    assert!(masks.masks["landuse"].is_empty());
    assert_eq!(masks.non_empty().count(), 0);
}

#[test]
fn geometry_outside_the_tile_yields_empty_verdict() {
    let tile = sample_tile();
    // A building three tiles east: matches the tag but never the tile.
    let faraway = Tile { zoom: tile.zoom, x: tile.x + 3, y: tile.y };
    let data = VectorData {
        ways: vec![way_at_pixels(
            1,
            tags(&[("building", "yes")]),
            &[(40.0, 40.0), (120.0, 40.0), (120.0, 120.0), (40.0, 120.0), (40.0, 40.0)],
            faraway,
        )],
        relations: Vec::new(),
    };
    let builder = MaskBuilder::new(SIZE, MaskMode::Merged);
    let masks = builder.build(&data, tile, &[TagQuery::parse("building")]);
    assert_eq!(masks.verdict(), TileVerdict::Empty);
}

#[test]
fn masks_are_byte_identical_across_invocations() {
    let tile = sample_tile();
    let data = courtyard_building(tile);
    let builder = MaskBuilder::new(SIZE, MaskMode::InstanceSeparated);
    let queries = [TagQuery::parse("building")];

    let first = builder.build(&data, tile, &queries);
    let second = builder.build(&data, tile, &queries);
    assert_eq!(first, second);
}

#[test]
fn residential_way_renders_a_band_of_configured_width() {
    let tile = sample_tile();
    let data = VectorData {
        ways: vec![way_at_pixels(
            1,
            tags(&[("highway", "residential")]),
            &[(20.0, 128.0), (220.0, 128.0)],
            tile,
        )],
        relations: Vec::new(),
    };
    let builder = MaskBuilder::new(SIZE, MaskMode::Merged);
    let masks = builder.build(&data, tile, &[TagQuery::parse("highway")]);
    let mask = &masks.masks["highway"];

    // Measure the filled extent perpendicular to the line at mid-way.
    let column: Vec<u32> = (0..SIZE).filter(|&y| mask.get(120, y) != 0).collect();
    assert!(!column.is_empty());
    let height = column.len() as i64;
    assert!(
        (height - 5).abs() <= 1,
        "expected a band about 5 px tall, got {height}"
    );
    // Centred on the way.
    assert!(column.contains(&128));
}

#[test]
fn duplicate_query_labels_keep_the_first_mask() {
    let tile = sample_tile();
    // Both queries file under "building"; the second matches nothing
    // here and must not wipe out the first query's rendering.
    let queries = [
        TagQuery::parse("building"),
        TagQuery::parse("amenity=building"),
    ];
    let builder = MaskBuilder::new(SIZE, MaskMode::Merged);
    let masks = builder.build(&courtyard_building(tile), tile, &queries);

    assert_eq!(masks.masks.len(), 1);
    assert_eq!(masks.verdict(), TileVerdict::NonEmpty);
    assert_eq!(masks.masks["building"].get(50, 80), 255);
}

#[test]
fn key_value_query_files_mask_under_the_value() {
    let tile = sample_tile();
    let data = VectorData {
        ways: vec![way_at_pixels(
            1,
            tags(&[("landuse", "forest")]),
            &[(40.0, 40.0), (120.0, 40.0), (120.0, 120.0), (40.0, 120.0), (40.0, 40.0)],
            tile,
        )],
        relations: Vec::new(),
    };
    let builder = MaskBuilder::new(SIZE, MaskMode::Merged);
    let masks = builder.build(&data, tile, &[TagQuery::parse("landuse=forest")]);
    assert!(masks.masks.contains_key("forest"));
    assert_eq!(masks.verdict(), TileVerdict::NonEmpty);
}
