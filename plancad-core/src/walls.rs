//! 墙体拓扑（连接模式）。
//!
//! 连接关系不单独存储，而是每次按端点距离从几何推导：两段墙的某对端点距离不超过
//! 阈值即视为相连。这里的函数都只做规划，返回待应用的更新，由调用方写回文档。
//! 传播是单跳的：移动墙 A 只会修改与 A 直接相连的墙。

use serde::{Deserialize, Serialize};

use crate::document::{Element, ElementId, ElementPatch};
use crate::geometry::{Point2, iter_points};

/// 默认连接阈值。
pub const LINK_THRESHOLD: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WallEndpoint {
    Start,
    End,
}

/// 墙体两端的绝对坐标。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallEndpoints {
    pub start: Point2,
    pub end: Point2,
}

impl WallEndpoints {
    #[inline]
    pub fn get(&self, which: WallEndpoint) -> Point2 {
        match which {
            WallEndpoint::Start => self.start,
            WallEndpoint::End => self.end,
        }
    }
}

/// 连接类型，前半部分为本墙端点，后半部分为相邻墙端点。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionType {
    StartToStart,
    StartToEnd,
    EndToStart,
    EndToEnd,
}

impl ConnectionType {
    const ALL: [ConnectionType; 4] = [
        ConnectionType::StartToStart,
        ConnectionType::StartToEnd,
        ConnectionType::EndToStart,
        ConnectionType::EndToEnd,
    ];

    #[inline]
    pub fn own_endpoint(self) -> WallEndpoint {
        match self {
            ConnectionType::StartToStart | ConnectionType::StartToEnd => WallEndpoint::Start,
            ConnectionType::EndToStart | ConnectionType::EndToEnd => WallEndpoint::End,
        }
    }

    #[inline]
    pub fn other_endpoint(self) -> WallEndpoint {
        match self {
            ConnectionType::StartToStart | ConnectionType::EndToStart => WallEndpoint::Start,
            ConnectionType::StartToEnd | ConnectionType::EndToEnd => WallEndpoint::End,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WallConnection {
    pub wall_id: ElementId,
    pub connection_type: ConnectionType,
}

/// 规划出的相邻墙更新。
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedUpdate {
    pub id: ElementId,
    pub patch: ElementPatch,
}

/// 返回墙体首尾端点的绝对坐标；非墙体或点数不足两个时返回 `None`。
pub fn wall_endpoints(element: &Element) -> Option<WallEndpoints> {
    let wall = element.as_wall()?;
    let mut points = iter_points(&wall.points);
    let first = points.next()?;
    let last = points.last()?;
    let origin = element.position();
    Some(WallEndpoints {
        start: first.offset(origin.x(), origin.y()),
        end: last.offset(origin.x(), origin.y()),
    })
}

/// 以给定阈值推导连接关系的解析器。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallLinker {
    threshold: f64,
}

impl Default for WallLinker {
    fn default() -> Self {
        Self::new(LINK_THRESHOLD)
    }
}

impl WallLinker {
    #[inline]
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.max(0.0),
        }
    }

    #[inline]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// 检查目标墙与其他每段墙的四组端点距离，每组在阈值内即产生一条连接记录。
    pub fn find_connected_walls(&self, wall_id: &ElementId, elements: &[Element]) -> Vec<WallConnection> {
        let Some(target) = elements.iter().find(|element| &element.id == wall_id) else {
            return Vec::new();
        };
        let Some(own) = wall_endpoints(target) else {
            return Vec::new();
        };

        let mut connections = Vec::new();
        for other in elements.iter().filter(|element| &element.id != wall_id) {
            let Some(theirs) = wall_endpoints(other) else {
                continue;
            };
            for connection_type in ConnectionType::ALL {
                let mine = own.get(connection_type.own_endpoint());
                let their = theirs.get(connection_type.other_endpoint());
                if mine.distance(their) <= self.threshold {
                    connections.push(WallConnection {
                        wall_id: other.id.clone(),
                        connection_type,
                    });
                }
            }
        }
        connections
    }

    /// 墙体整体平移 `(dx, dy)` 时，相连墙的对应端点同步平移。
    /// 必须在应用平移之前调用，连接关系按当前几何推导。
    pub fn linked_wall_updates(
        &self,
        moved_wall_id: &ElementId,
        dx: f64,
        dy: f64,
        elements: &[Element],
        link_mode: bool,
    ) -> Vec<LinkedUpdate> {
        if !link_mode {
            return Vec::new();
        }
        let connections = self.find_connected_walls(moved_wall_id, elements);
        plan_updates(&connections, elements, |_, point| point.offset(dx, dy))
    }

    /// 多段墙一起平移时的联动规划。所有连接都按平移前的几何推导，
    /// 同属移动集合的墙不作为相邻墙；同一相邻墙端点无论被几段墙连接都只平移一次。
    pub fn linked_group_updates(
        &self,
        moved_ids: &[ElementId],
        dx: f64,
        dy: f64,
        elements: &[Element],
        link_mode: bool,
    ) -> Vec<LinkedUpdate> {
        if !link_mode {
            return Vec::new();
        }
        let connections: Vec<WallConnection> = moved_ids
            .iter()
            .flat_map(|id| self.find_connected_walls(id, elements))
            .filter(|connection| !moved_ids.contains(&connection.wall_id))
            .collect();
        plan_updates(&connections, elements, |_, point| point.offset(dx, dy))
    }

    /// 拉伸墙体某一端到 `new_position`（绝对坐标）时，只传播经过该端点的连接。
    pub fn linked_wall_stretch_updates(
        &self,
        wall_id: &ElementId,
        which: WallEndpoint,
        new_position: Point2,
        elements: &[Element],
        link_mode: bool,
    ) -> Vec<LinkedUpdate> {
        if !link_mode {
            return Vec::new();
        }
        let connections: Vec<WallConnection> = self
            .find_connected_walls(wall_id, elements)
            .into_iter()
            .filter(|connection| connection.connection_type.own_endpoint() == which)
            .collect();
        plan_updates(&connections, elements, |_, _| new_position)
    }

    /// 重新计算每段墙的 `connected_walls` 快照，只返回与现有快照不同的墙。
    pub fn connection_snapshot(&self, elements: &[Element]) -> Vec<LinkedUpdate> {
        elements
            .iter()
            .filter_map(|element| {
                let wall = element.as_wall()?;
                let mut ids: Vec<ElementId> = Vec::new();
                for connection in self.find_connected_walls(&element.id, elements) {
                    if !ids.contains(&connection.wall_id) {
                        ids.push(connection.wall_id);
                    }
                }
                if ids == wall.connected_walls {
                    return None;
                }
                Some(LinkedUpdate {
                    id: element.id.clone(),
                    patch: ElementPatch {
                        connected_walls: Some(ids),
                        ..ElementPatch::default()
                    },
                })
            })
            .collect()
    }
}

/// 将每条连接作用到相邻墙的匹配端点上。同一相邻墙的多条连接合并为一次更新，
/// 同一端点只修改一次。
fn plan_updates<F>(connections: &[WallConnection], elements: &[Element], mut relocate: F) -> Vec<LinkedUpdate>
where
    F: FnMut(WallEndpoint, Point2) -> Point2,
{
    let mut planned: Vec<(ElementId, Vec<f64>, Vec<WallEndpoint>)> = Vec::new();
    for connection in connections {
        let Some(neighbour) = elements.iter().find(|e| e.id == connection.wall_id) else {
            continue;
        };
        let Some(wall) = neighbour.as_wall() else {
            continue;
        };
        let slot = match planned.iter().position(|(id, _, _)| id == &neighbour.id) {
            Some(index) => index,
            None => {
                planned.push((neighbour.id.clone(), wall.points.clone(), Vec::new()));
                planned.len() - 1
            }
        };
        let (_, points, touched) = &mut planned[slot];
        let endpoint = connection.connection_type.other_endpoint();
        if touched.contains(&endpoint) {
            continue;
        }
        let Some(index) = endpoint_index(points, endpoint) else {
            continue;
        };
        let origin = neighbour.position();
        let current = Point2::new(points[index] + origin.x(), points[index + 1] + origin.y());
        let target = relocate(endpoint, current);
        points[index] = target.x() - origin.x();
        points[index + 1] = target.y() - origin.y();
        touched.push(endpoint);
    }

    planned
        .into_iter()
        .map(|(id, points, _)| LinkedUpdate {
            id,
            patch: ElementPatch::points(points),
        })
        .collect()
}

fn endpoint_index(points: &[f64], endpoint: WallEndpoint) -> Option<usize> {
    let pairs = points.len() / 2;
    if pairs < 2 {
        return None;
    }
    Some(match endpoint {
        WallEndpoint::Start => 0,
        WallEndpoint::End => (pairs - 1) * 2,
    })
}

/// 以默认阈值查找相连墙体。
pub fn find_connected_walls(wall_id: &ElementId, elements: &[Element]) -> Vec<WallConnection> {
    WallLinker::default().find_connected_walls(wall_id, elements)
}

pub fn linked_wall_updates(
    moved_wall_id: &ElementId,
    dx: f64,
    dy: f64,
    elements: &[Element],
    link_mode: bool,
) -> Vec<LinkedUpdate> {
    WallLinker::default().linked_wall_updates(moved_wall_id, dx, dy, elements, link_mode)
}

pub fn linked_wall_stretch_updates(
    wall_id: &ElementId,
    which: WallEndpoint,
    new_position: Point2,
    elements: &[Element],
    link_mode: bool,
) -> Vec<LinkedUpdate> {
    WallLinker::default().linked_wall_stretch_updates(wall_id, which, new_position, elements, link_mode)
}
