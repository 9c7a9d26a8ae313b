//! Flat typed-array encodings for bulk reply payloads.
//!
//! Strides and integer codings are part of the external contract:
//! road segments stride 6, parcel headers stride 9, parcel vertices
//! stride 2 with a separator vertex between parcels, block headers
//! stride 4.

use crate::blocks::CityBlock;
use crate::core::messages::{IntersectionInfo, ParcelBuffers};
use crate::parcels::Parcel;
use crate::roads::{RoadGraph, Welder};

/// Separator vertex between parcel outlines in the vertex stream.
pub const PARCEL_SEPARATOR: f32 = -999_999.0;

pub const ROAD_SEGMENT_STRIDE: usize = 6;
pub const PARCEL_HEADER_STRIDE: usize = 9;
pub const BLOCK_HEADER_STRIDE: usize = 4;

/// Stride 6: startX, startY, endX, endY, width, classCode.
pub fn road_segments(graph: &RoadGraph) -> Vec<f32> {
    let mut out = Vec::with_capacity(graph.enabled_edge_count() * ROAD_SEGMENT_STRIDE);
    for (_, edge) in graph.iter_enabled_edges() {
        let a = graph.node(edge.a).position;
        let b = graph.node(edge.b).position;
        out.extend_from_slice(&[
            a.x as f32,
            a.y as f32,
            b.x as f32,
            b.y as f32,
            edge.width as f32,
            edge.class.code() as f32,
        ]);
    }
    out
}

pub fn intersections(welder: &Welder) -> Vec<IntersectionInfo> {
    welder
        .iter_enabled()
        .map(|(_, rec)| IntersectionInfo {
            position: rec.position,
            segment_count: rec.segments.len() as u32,
            kind: match rec.kind {
                crate::roads::IntersectionKind::End => "end",
                crate::roads::IntersectionKind::Tee => "T",
                crate::roads::IntersectionKind::Cross => "cross",
                crate::roads::IntersectionKind::Complex => "complex",
            },
            orientation: rec.orientation,
            radius: rec.radius,
        })
        .collect()
}

/// Stride 9 headers plus the separator-delimited vertex stream.
pub fn parcel_buffers<'a>(parcels: impl Iterator<Item = &'a Parcel>) -> ParcelBuffers {
    let mut buffers = ParcelBuffers::default();
    for p in parcels {
        buffers.headers.extend_from_slice(&[
            p.id as f32,
            p.zone.code() as f32,
            p.density.code() as f32,
            p.area as f32,
            p.frontage as f32,
            if p.is_corner { 1.0 } else { 0.0 },
            p.centroid.x as f32,
            p.centroid.y as f32,
            p.block.raw() as f32,
        ]);
        for v in &p.polygon {
            buffers.vertices.extend_from_slice(&[v.x as f32, v.y as f32]);
        }
        buffers
            .vertices
            .extend_from_slice(&[PARCEL_SEPARATOR, PARCEL_SEPARATOR]);
    }
    buffers
}

/// Stride 4: id, area, perimeter, parcelCount.
pub fn block_headers<'a>(blocks: impl Iterator<Item = &'a CityBlock>) -> Vec<f32> {
    let mut out = Vec::new();
    for b in blocks {
        out.extend_from_slice(&[
            b.id.raw() as f32,
            b.area as f32,
            b.perimeter as f32,
            b.parcel_ids.len() as f32,
        ]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tolerances;
    use crate::roads::{RoadClass, RoadMaterial};
    use glam::DVec2;

    #[test]
    fn test_road_segment_stride() {
        let mut g = RoadGraph::new(Tolerances::default());
        let mut w = Welder::new();
        w.add_segment(
            &mut g,
            DVec2::new(0.0, 0.0),
            DVec2::new(100.0, 0.0),
            RoadClass::Avenue,
            RoadMaterial::Asphalt,
        );
        let buf = road_segments(&g);
        assert_eq!(buf.len(), ROAD_SEGMENT_STRIDE);
        assert_eq!(buf[4], 16.0); // avenue width
        assert_eq!(buf[5], 1.0); // avenue code
    }

    #[test]
    fn test_parcel_buffer_separator() {
        use crate::blocks::BlockId;
        use crate::parcels::{Density, ZoneType};

        let square = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(10.0, 0.0),
            DVec2::new(10.0, 10.0),
            DVec2::new(0.0, 10.0),
        ];
        let parcel = Parcel {
            id: 3,
            area: 100.0,
            centroid: DVec2::new(5.0, 5.0),
            polygon: square,
            zone: ZoneType::Commercial,
            density: Density::High,
            frontage: 10.0,
            frontage_edge: None,
            is_corner: true,
            block: BlockId::new(2),
        };
        let bufs = parcel_buffers([&parcel].into_iter());
        assert_eq!(bufs.headers.len(), PARCEL_HEADER_STRIDE);
        assert_eq!(bufs.headers[0], 3.0);
        assert_eq!(bufs.headers[1], 1.0); // commercial
        assert_eq!(bufs.headers[2], 2.0); // high
        assert_eq!(bufs.headers[5], 1.0); // corner flag
        assert_eq!(bufs.headers[8], 2.0); // block id
        // 4 vertices + separator.
        assert_eq!(bufs.vertices.len(), (4 + 1) * 2);
        assert_eq!(bufs.vertices[8], PARCEL_SEPARATOR);
        assert_eq!(bufs.vertices[9], PARCEL_SEPARATOR);
    }
}
