use url::Url;

use super::{
    model::{non_empty, AdaptationSet, Representation},
    template::Template,
    url::merge_baseurls,
};
use crate::{
    error::{TsumugiError, TsumugiResult},
    mp4::SidxInfo,
    ByteRange,
};

/// Which template timing sizes a track's segment list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SegmentCountMode {
    /// Count segments once, from the best Representation of the first AdaptationSet, and use
    /// that count for every track.
    #[default]
    Global,
    /// Count segments from each track's own template timing.
    PerTrack,
}

/// SegmentTemplate attributes of a Representation, each falling back to the AdaptationSet's
/// SegmentTemplate when missing or empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolvedTemplate<'a> {
    pub duration: Option<&'a str>,
    pub timescale: Option<&'a str>,
    pub initialization: Option<&'a str>,
    pub media: Option<&'a str>,
    pub start_number: Option<&'a str>,
}

impl<'a> ResolvedTemplate<'a> {
    pub fn resolve(adaptation: &'a AdaptationSet, representation: &'a Representation) -> Self {
        let own = representation.segment_template.as_ref();
        let fallback = adaptation.segment_template.as_ref();
        macro_rules! pick {
            ($field:ident) => {
                own.and_then(|t| non_empty(&t.$field))
                    .or_else(|| fallback.and_then(|t| non_empty(&t.$field)))
            };
        }

        Self {
            duration: pick!(duration),
            timescale: pick!(timescale),
            initialization: pick!(initialization),
            media: pick!(media),
            start_number: pick!(start_number),
        }
    }

    /// `startNumber`, defaulting to 1 when absent, malformed or not positive.
    pub fn start_number(&self) -> u64 {
        self.start_number
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|n| *n > 0)
            .map(|n| n as u64)
            .unwrap_or(1)
    }

    /// Number of segments covering `duration_secs`: `ceil(D / (duration / timescale))`, or 1 when
    /// the template carries no timing.
    pub fn segment_count(&self, duration_secs: f64) -> TsumugiResult<u64> {
        let (Some(duration), Some(timescale)) = (self.duration, self.timescale) else {
            return Ok(1);
        };

        let parse = |name: &str, value: &str| {
            value.trim().parse::<i64>().map_err(|e| {
                TsumugiError::ManifestParse(format!("invalid segment {name} {value:?}: {e}"))
            })
        };
        let duration = parse("duration", duration)?;
        let timescale = parse("timescale", timescale)?;
        if duration <= 0 || timescale <= 0 {
            return Err(TsumugiError::InvalidSegmentCount(format!(
                "duration {duration}, timescale {timescale}"
            )));
        }

        let count = (duration_secs / (duration as f64 / timescale as f64)).ceil();
        if !count.is_finite() || count <= 0. {
            return Err(TsumugiError::InvalidSegmentCount(count.to_string()));
        }
        Ok(count as u64)
    }
}

pub fn template_segment_count(
    duration_secs: f64,
    adaptation: &AdaptationSet,
    representation: &Representation,
) -> TsumugiResult<u64> {
    ResolvedTemplate::resolve(adaptation, representation).segment_count(duration_secs)
}

/// One numbered media segment of a template plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSegment {
    pub number: u64,
    /// The substituted `media` template, relative to the base URL.
    pub name: String,
    pub url: Url,
}

#[derive(Debug, Clone)]
pub struct TemplatePlan {
    pub base: Url,
    pub representation_id: String,
    pub bandwidth: Option<u64>,
    pub init_name: String,
    pub media_template: String,
    pub start_number: u64,
    pub count: u64,
}

impl TemplatePlan {
    pub fn init_url(&self) -> TsumugiResult<Url> {
        merge_baseurls(&self.base, &self.init_name)
    }

    /// All media segments, numbered from `startNumber`.
    pub fn segments(&self) -> TsumugiResult<Vec<MediaSegment>> {
        let template = Template::new(&self.representation_id).with_bandwidth(self.bandwidth);

        (0..self.count)
            .map(|index| {
                let number = self.start_number + index;
                let name = template.clone().with_number(number).resolve(&self.media_template);
                let url = merge_baseurls(&self.base, &name)?;
                Ok(MediaSegment { number, name, url })
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct IndexedPlan {
    pub url: Url,
    pub init_range: ByteRange,
    pub index_range: ByteRange,
}

#[derive(Debug, Clone)]
pub enum SegmentPlan {
    /// `$Number$` addressed segments appended to a separately fetched init segment.
    Template(TemplatePlan),
    /// One file indexed by a `sidx` box, read with byte ranges.
    Indexed(IndexedPlan),
    /// The whole track is a single file.
    Single(Url),
}

/// Decide how the track of `representation` is addressed.
///
/// `count` is the template segment count, only used when a `media` template exists.
pub fn build_plan(
    base: &Url,
    adaptation: &AdaptationSet,
    representation: &Representation,
    count: u64,
) -> TsumugiResult<SegmentPlan> {
    let template = ResolvedTemplate::resolve(adaptation, representation);
    let representation_id = representation.id().to_string();
    let base_name = representation
        .base_url
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let init_name = match template.initialization {
        Some(initialization) => Some(
            Template::new(&representation_id)
                .with_bandwidth(representation.bandwidth())
                .resolve(initialization),
        ),
        None => base_name.map(str::to_string),
    };

    if let Some(media) = template.media {
        let init_name =
            init_name.ok_or_else(|| TsumugiError::MissingInitialization(representation_id.clone()))?;
        return Ok(SegmentPlan::Template(TemplatePlan {
            base: base.clone(),
            representation_id,
            bandwidth: representation.bandwidth(),
            init_name,
            media_template: media.to_string(),
            start_number: template.start_number(),
            count,
        }));
    }

    if let (Some(base_name), Some(segment_base)) = (base_name, &representation.segment_base) {
        let init_range = segment_base
            .initialization
            .as_ref()
            .and_then(|i| non_empty(&i.range));
        let index_range = non_empty(&segment_base.index_range);
        if let (Some(init_range), Some(index_range)) = (init_range, index_range) {
            return Ok(SegmentPlan::Indexed(IndexedPlan {
                url: merge_baseurls(base, base_name)?,
                init_range: init_range.parse()?,
                index_range: index_range.parse()?,
            }));
        }
    }

    let init_name = init_name.ok_or(TsumugiError::MissingInitialization(representation_id))?;
    Ok(SegmentPlan::Single(merge_baseurls(base, &init_name)?))
}

/// Absolute byte ranges of the segments referenced by `sidx`, found in an index fetched from
/// `index_start`.
///
/// The first segment starts `first_offset` bytes after the end of the sidx box, and each
/// following one right after its predecessor. A zero size ends the list.
pub fn indexed_segment_ranges(
    sidx: &SidxInfo,
    index_start: u64,
) -> TsumugiResult<Vec<ByteRange>> {
    let overflow = || {
        TsumugiError::BoxParse(format!(
            "sidx offsets overflow: index at {index_start}, first offset {}",
            sidx.first_offset
        ))
    };

    let mut start = index_start
        .checked_add(sidx.box_offset as u64)
        .and_then(|v| v.checked_add(sidx.box_size))
        .and_then(|v| v.checked_add(sidx.first_offset))
        .ok_or_else(overflow)?;

    let mut ranges = Vec::new();
    for size in sidx.reference_sizes.iter().take_while(|size| **size > 0) {
        let size = *size as u64;
        let end = start.checked_add(size).ok_or_else(overflow)?;
        ranges.push(ByteRange::new(start, Some(size)));
        start = end;
    }
    Ok(ranges)
}
