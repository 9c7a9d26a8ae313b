//! The city core: single owner of all pipeline state.
//!
//! Every mutating operation on the graph, welder, blocks, parcels and
//! massings happens inside `handle`, one request at a time, in arrival
//! order. The channel runner gives external collaborators a plain
//! request/reply seam; within a request the core runs to completion.

use crossbeam_channel::{Receiver, Sender};
use glam::DVec2;
use std::collections::HashMap;

use crate::blocks::{find_blocks, BlockId, CityBlock};
use crate::config::CoreConfig;
use crate::core::buffers;
use crate::core::messages::*;
use crate::geom::{ensure_ccw, point_in_polygon, polygon_area, polygon_intersects, polygon_perimeter};
use crate::layout::LayoutGenerator;
use crate::massing::{generate_massing, mesh_for_massing, BuildingMassing, Lod, MeshData};
use crate::parcels::{subdivide_block, Parcel};
use crate::rng::Mulberry32;
use crate::roads::{EdgeRejection, RoadGraph, Welder};

/// Centroid match radius for building placement (m).
const CENTROID_MATCH: f64 = 5.0;
/// Last-resort parcel search radius (m).
const NEAREST_MATCH: f64 = 100.0;

pub struct CityCore {
    pub cfg: CoreConfig,
    pub graph: RoadGraph,
    pub welder: Welder,
    pub blocks: Vec<CityBlock>,
    pub parcels: Vec<Parcel>,
    pub massings: Vec<BuildingMassing>,
    mesh_cache: HashMap<(u32, u8), MeshData>,
    layout: LayoutGenerator,
    next_parcel_id: u32,
    next_massing_id: u32,
    next_block_id: u32,
    default_lod: Lod,
}

impl CityCore {
    pub fn new(cfg: CoreConfig) -> Self {
        let graph = RoadGraph::new(cfg.tolerances.clone());
        Self {
            cfg,
            graph,
            welder: Welder::new(),
            blocks: Vec::new(),
            parcels: Vec::new(),
            massings: Vec::new(),
            mesh_cache: HashMap::new(),
            layout: LayoutGenerator::default(),
            next_parcel_id: 0,
            next_massing_id: 0,
            next_block_id: 0,
            default_lod: Lod::Mid,
        }
    }

    /// Re-enumerate blocks from the graph. Ids stay monotonic across
    /// recomputes so replies are reproducible; virtual blocks (which no
    /// graph face backs) survive untouched unless `keep_virtual` is off.
    fn refresh_blocks(&mut self, keep_virtual: bool) {
        let virtuals: Vec<CityBlock> = self
            .blocks
            .drain(..)
            .filter(|b| keep_virtual && b.virtual_block)
            .collect();
        let mut found = find_blocks(&self.graph);
        for b in &mut found {
            b.id = BlockId::new(self.next_block_id);
            self.next_block_id += 1;
        }
        self.blocks = found;
        self.blocks.extend(virtuals);
    }

    /// Process one request to completion.
    pub fn handle(&mut self, request: Request) -> Reply {
        match request {
            Request::Boot { seed, era } => {
                self.cfg.seed = seed;
                self.cfg.era = era;
                self.rebuild_city();
                self.roads_reply()
            }
            Request::ShuffleSeed { seed } => {
                self.cfg.seed = seed;
                self.rebuild_city();
                self.roads_reply()
            }
            Request::SetEra { era } => {
                self.cfg.era = era;
                self.rebuild_city();
                self.roads_reply()
            }
            Request::PaintRoad { start, end, class } => self.paint_road(start, end, class),
            Request::GetRoads => self.roads_reply(),
            Request::PaintZone(zone) => self.paint_zone(zone),
            Request::GetParcels => Reply::Parcels(buffers::parcel_buffers(self.parcels.iter())),
            Request::GetBlocks => Reply::Blocks {
                headers: buffers::block_headers(self.blocks.iter()),
            },
            Request::ClearZones => {
                self.parcels.clear();
                self.massings.clear();
                self.mesh_cache.clear();
                self.refresh_blocks(false);
                Reply::ZonesCleared {
                    blocks: self.blocks.len(),
                }
            }
            Request::GenerateBuildingForZone {
                zone_id,
                position,
                level,
                event,
            } => self.spawn_building(zone_id, position, level, event),
            Request::GenerateBuildings { lod } => {
                let lod = lod.unwrap_or(self.default_lod);
                let (emitted, dropped) = self.generate_all_buildings(lod);
                Reply::BuildingsGenerated {
                    emitted,
                    dropped,
                    lod,
                }
            }
            Request::GetBuildingMesh { building, lod } => self.building_mesh(building, lod),
            Request::SetBuildingLod { lod } => {
                self.default_lod = lod;
                Reply::LodSet { lod }
            }
            Request::RegenerateWithZone { zone, lod } => {
                let lod = lod.unwrap_or(self.default_lod);
                let painted = self.paint_zone(zone);
                let affected = match &painted {
                    Reply::ZonePainted {
                        affected_parcels, ..
                    } => affected_parcels.clone(),
                    _ => Vec::new(),
                };
                let mut emitted = 0;
                let mut dropped = 0;
                for pid in affected {
                    if let Some(parcel) = self.parcels.iter().find(|p| p.id == pid).cloned() {
                        match self.build_on(&parcel, 1, lod) {
                            Some(_) => emitted += 1,
                            None => dropped += 1,
                        }
                    }
                }
                Reply::BuildingsGenerated {
                    emitted,
                    dropped,
                    lod,
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // City rebuild
    // ------------------------------------------------------------------------

    /// Full deterministic rebuild from (seed, era, bounds).
    fn rebuild_city(&mut self) {
        self.graph.clear();
        self.welder.clear();
        self.parcels.clear();
        self.massings.clear();
        self.mesh_cache.clear();
        self.next_parcel_id = 0;
        self.next_massing_id = 0;
        self.next_block_id = 0;
        self.blocks.clear();

        if self.cfg.generate_on_boot {
            let seed = self.cfg.seed;
            let cfg = self.cfg.clone();
            self.layout
                .generate(&mut self.graph, &mut self.welder, &cfg, seed);
        }
        self.refresh_blocks(false);
    }

    fn roads_reply(&self) -> Reply {
        Reply::RoadsGenerated {
            segments: buffers::road_segments(&self.graph),
            intersections: buffers::intersections(&self.welder),
        }
    }

    // ------------------------------------------------------------------------
    // Roads
    // ------------------------------------------------------------------------

    fn paint_road(&mut self, start: DVec2, end: DVec2, class: crate::roads::RoadClass) -> Reply {
        // External paint is rejected out of bounds, not clamped.
        if !self.cfg.contains(start) || !self.cfg.contains(end) {
            return Reply::RoadPainted {
                success: false,
                error: Some(CoreError::OutOfBounds),
                segments: Vec::new(),
                intersections: Vec::new(),
            };
        }

        let material = self.cfg.era.material_for(class);
        let outcome = self
            .welder
            .add_segment(&mut self.graph, start, end, class, material);

        let error = if outcome.success() {
            None
        } else {
            outcome.rejections.first().map(|r| match r {
                EdgeRejection::Degenerate => CoreError::DegenerateGeometry,
                EdgeRejection::AngleTooAcute => CoreError::AngleTooAcute,
            })
        };
        if let Some(err) = error {
            log::warn!("paint-road rejected: {err}");
        }

        // Blocks follow every road edit.
        self.refresh_blocks(true);

        let mut segments = Vec::new();
        for &eid in outcome.new_edges.iter().chain(outcome.rebuilt_edges.iter()) {
            let e = self.graph.edge(eid);
            let (a, b) = (
                self.graph.node(e.a).position,
                self.graph.node(e.b).position,
            );
            segments.extend_from_slice(&[
                a.x as f32,
                a.y as f32,
                b.x as f32,
                b.y as f32,
                e.width as f32,
                e.class.code() as f32,
            ]);
        }
        let intersections = outcome
            .intersections
            .iter()
            .map(|&rid| {
                let rec = self.welder.record(rid);
                IntersectionInfo {
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
                }
            })
            .collect();

        Reply::RoadPainted {
            success: outcome.success(),
            error,
            segments,
            intersections,
        }
    }

    // ------------------------------------------------------------------------
    // Zones and parcels
    // ------------------------------------------------------------------------

    fn paint_zone(&mut self, req: ZoneRequest) -> Reply {
        let mut paint = req.polygon.clone();
        if paint.len() < 3 {
            return Reply::ZonePainted {
                affected_parcels: Vec::new(),
                parcels: Default::default(),
                blocks: Vec::new(),
                emitted: 0,
                dropped: 0,
                error: Some(CoreError::DegenerateGeometry),
            };
        }
        ensure_ccw(&mut paint);
        let method = req.method.unwrap_or_default();
        let tol = self.cfg.tolerances.clone();

        // Blocks touched by the paint polygon.
        let mut affected_blocks: Vec<usize> = (0..self.blocks.len())
            .filter(|&i| {
                polygon_intersects(
                    &self.blocks[i].polygon,
                    &paint,
                    tol.parallel_eps,
                    tol.line_t_eps,
                )
            })
            .collect();

        let mut error = None;
        if affected_blocks.is_empty() {
            // Standalone zone: the paint polygon becomes its own block.
            error = Some(CoreError::EmptyIntersection);
            let id = BlockId::new(self.blocks.len() as u32);
            self.blocks.push(CityBlock {
                id,
                area: polygon_area(&paint),
                perimeter: polygon_perimeter(&paint),
                polygon: paint.clone(),
                holes: Vec::new(),
                road_edges: Vec::new(),
                parcel_ids: Vec::new(),
                virtual_block: true,
            });
            affected_blocks.push(self.blocks.len() - 1);
        }

        let mut affected_parcels = Vec::new();
        let mut dropped_total = 0;
        for bi in affected_blocks.iter().copied() {
            // Replace whatever tiled this block before. Stale parcels from
            // a block enumerated before a road edit are matched by centroid
            // since their block id no longer resolves.
            let bid = self.blocks[bi].id;
            let block_poly = self.blocks[bi].polygon.clone();
            let old: Vec<u32> = self
                .parcels
                .iter()
                .filter(|p| p.block == bid || point_in_polygon(p.centroid, &block_poly))
                .map(|p| p.id)
                .collect();
            self.blocks[bi].parcel_ids.clear();
            if !old.is_empty() {
                self.parcels.retain(|p| !old.contains(&p.id));
                self.massings.retain(|m| !old.contains(&m.parcel));
                self.mesh_cache.retain(|(pid, _), _| !old.contains(pid));
            }

            let block = self.blocks[bi].clone();
            let road_segs: Vec<(crate::roads::EdgeId, DVec2, DVec2)> = block
                .road_edges
                .iter()
                .filter(|&&eid| self.graph.edge(eid).enabled)
                .map(|&eid| {
                    let e = self.graph.edge(eid);
                    (
                        eid,
                        self.graph.node(e.a).position,
                        self.graph.node(e.b).position,
                    )
                })
                .collect();

            // Per-block stream keyed off the boot seed: repeated paints of
            // the same polygon reproduce identical parcel geometry.
            let mut rng = Mulberry32::new(
                self.cfg
                    .seed
                    .wrapping_add(block.id.raw().wrapping_mul(7919)),
            );
            let outcome = subdivide_block(
                &block,
                &road_segs,
                req.zone,
                req.density,
                method,
                &mut rng,
                &tol,
                self.next_parcel_id,
            );
            if let Some(last) = outcome.parcels.last() {
                self.next_parcel_id = last.id + 1;
            }
            dropped_total += outcome.dropped;

            for p in &outcome.parcels {
                self.blocks[bi].parcel_ids.push(p.id);
                affected_parcels.push(p.id);
            }
            self.parcels.extend(outcome.parcels);
        }

        let emitted = affected_parcels.len();
        let parcels = buffers::parcel_buffers(
            self.parcels
                .iter()
                .filter(|p| affected_parcels.contains(&p.id)),
        );
        let blocks = buffers::block_headers(
            affected_blocks
                .iter()
                .map(|&bi| &self.blocks[bi]),
        );

        Reply::ZonePainted {
            affected_parcels,
            parcels,
            blocks,
            emitted,
            dropped: dropped_total,
            error,
        }
    }

    // ------------------------------------------------------------------------
    // Buildings
    // ------------------------------------------------------------------------

    /// Point-in-polygon, then close centroid, then nearest within reach.
    fn locate_parcel(&self, position: DVec2) -> Option<u32> {
        for p in &self.parcels {
            if point_in_polygon(position, &p.polygon) {
                return Some(p.id);
            }
        }
        for p in &self.parcels {
            if p.centroid.distance(position) <= CENTROID_MATCH {
                return Some(p.id);
            }
        }
        self.parcels
            .iter()
            .map(|p| (p.centroid.distance(position), p.id))
            .filter(|&(d, _)| d <= NEAREST_MATCH)
            .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(_, id)| id)
    }

    /// Generate (or regenerate) the massing for one parcel and cache its
    /// mesh; returns the massing id.
    fn build_on(&mut self, parcel: &Parcel, level: u32, lod: Lod) -> Option<u32> {
        let massing = generate_massing(parcel, self.cfg.era, level, self.next_massing_id)?;
        let mesh = mesh_for_massing(&massing, lod);
        self.mesh_cache.insert((parcel.id, lod.code()), mesh);

        // One massing per parcel; upgrades replace.
        self.massings.retain(|m| m.parcel != parcel.id);
        let id = massing.id;
        self.massings.push(massing);
        self.next_massing_id += 1;
        Some(id)
    }

    fn spawn_building(
        &mut self,
        zone_id: u32,
        position: DVec2,
        level: u32,
        event: SpawnEvent,
    ) -> Reply {
        let lod = self.default_lod;
        let Some(pid) = self.locate_parcel(position) else {
            log::warn!("spawn for zone {zone_id}: no parcel near {position:?}");
            return Reply::BuildingSpawned {
                parcel: None,
                building: None,
                mesh: None,
                lod,
                error: Some(CoreError::IndexMiss),
            };
        };
        let Some(parcel) = self.parcels.iter().find(|p| p.id == pid).cloned() else {
            return Reply::BuildingSpawned {
                parcel: None,
                building: None,
                mesh: None,
                lod,
                error: Some(CoreError::IndexMiss),
            };
        };

        let level = match event {
            SpawnEvent::Spawn => level.max(1),
            SpawnEvent::Upgrade => level.max(2),
        };

        match self.build_on(&parcel, level, lod) {
            Some(_) => {
                let building = self
                    .massings
                    .iter()
                    .find(|m| m.parcel == pid)
                    .cloned();
                let mesh = self.mesh_cache.remove(&(pid, lod.code()));
                Reply::BuildingSpawned {
                    parcel: Some(pid),
                    building,
                    mesh,
                    lod,
                    error: None,
                }
            }
            None => Reply::BuildingSpawned {
                parcel: Some(pid),
                building: None,
                mesh: None,
                lod,
                error: Some(CoreError::DegenerateGeometry),
            },
        }
    }

    fn generate_all_buildings(&mut self, lod: Lod) -> (usize, usize) {
        let zoned: Vec<Parcel> = self
            .parcels
            .iter()
            .filter(|p| p.zone != crate::parcels::ZoneType::None)
            .cloned()
            .collect();
        let mut emitted = 0;
        let mut dropped = 0;
        for parcel in zoned {
            match self.build_on(&parcel, 1, lod) {
                Some(_) => emitted += 1,
                None => dropped += 1,
            }
        }
        log::info!("bulk massing: {emitted} emitted, {dropped} dropped");
        (emitted, dropped)
    }

    fn building_mesh(&mut self, building: u32, lod: Lod) -> Reply {
        let Some(massing) = self.massings.iter().find(|m| m.id == building).cloned() else {
            return Reply::BuildingMesh {
                building,
                lod,
                mesh: None,
                error: Some(CoreError::IndexMiss),
            };
        };
        // Cache hit moves the buffers out; miss regenerates (massings are
        // reproducible, so the result is identical).
        let mesh = self
            .mesh_cache
            .remove(&(massing.parcel, lod.code()))
            .unwrap_or_else(|| mesh_for_massing(&massing, lod));
        Reply::BuildingMesh {
            building,
            lod,
            mesh: Some(mesh),
            error: None,
        }
    }
}

/// Drain requests until the channel disconnects. The core owns all state;
/// replies (mesh buffers included) are moved to the sender.
pub fn run_core(mut core: CityCore, requests: Receiver<Request>, replies: Sender<Reply>) {
    while let Ok(request) = requests.recv() {
        let reply = core.handle(request);
        if replies.send(reply).is_err() {
            break;
        }
    }
}
