use serde::Serialize;
use std::sync::Arc;

use super::phase::Metric;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub time: f64,
    pub value: f64,
}

impl Point {
    pub fn new(time: f64, value: f64) -> Self {
        Self { time, value }
    }
}

/// Append-only sequence for one metric.
///
/// Points live behind an `Arc` so snapshots handed to renderers are cheap
/// clones; appends copy-on-write only while a snapshot is still held.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    points: Arc<Vec<Point>>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points: Arc::new(points) }
    }

    /// Append, then trim from the front so at most `cap` points remain.
    pub fn push(&mut self, point: Point, cap: Option<usize>) {
        let points = Arc::make_mut(&mut self.points);
        points.push(point);
        if let Some(cap) = cap {
            if points.len() > cap {
                let excess = points.len() - cap;
                points.drain(..excess);
            }
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn last(&self) -> Option<&Point> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points = Arc::new(Vec::new());
    }
}

/// One series per metric, indexed by [`Metric::index`].
#[derive(Debug, Clone, Default)]
pub struct SeriesSet {
    series: [TimeSeries; Metric::COUNT],
}

impl SeriesSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, metric: Metric) -> &TimeSeries {
        &self.series[metric.index()]
    }

    pub fn get_mut(&mut self, metric: Metric) -> &mut TimeSeries {
        &mut self.series[metric.index()]
    }

    /// Swap a whole series in one step. Observers never see a partial fill.
    pub fn replace(&mut self, metric: Metric, series: TimeSeries) {
        self.series[metric.index()] = series;
    }

    pub fn is_empty(&self) -> bool {
        self.series.iter().all(TimeSeries::is_empty)
    }

    pub fn clear(&mut self) {
        for s in &mut self.series {
            s.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_drops_oldest_first() {
        let mut s = TimeSeries::new();
        for i in 0..5 {
            s.push(Point::new(i as f64, 10.0 * i as f64), Some(3));
        }
        let times: Vec<f64> = s.points().iter().map(|p| p.time).collect();
        assert_eq!(times, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn snapshot_is_isolated_from_later_appends() {
        let mut s = TimeSeries::new();
        s.push(Point::new(0.0, 1.0), None);
        let snapshot = s.clone();
        s.push(Point::new(1.0, 2.0), None);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(s.len(), 2);
    }
}
