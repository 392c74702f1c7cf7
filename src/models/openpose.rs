// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// OpenPose 后处理模块
// 输入: 热力图 (19通道, 最后一个为背景) + PAF 部位亲和场 (38通道)
// 输出: 人体骨架 (18个关键点, 每个可能未分配)
//
// 注意: 本模块仅实现后处理器, 推理由 models::InferenceEngine 提供

use ndarray::ArrayView3;
use serde::{Deserialize, Serialize};

use crate::error::VisionError;

/// 关键点类别数 (不含背景)
pub const PART_COUNT: usize = 18;

/// 肢体连接 (部位A, 部位B), 顺序即组装顺序
pub const COCO_PAIRS: [(usize, usize); 17] = [
    (1, 2),
    (1, 5),
    (2, 3),
    (3, 4),
    (5, 6),
    (6, 7),
    (1, 8),
    (8, 9),
    (9, 10),
    (1, 11),
    (11, 12),
    (12, 13),
    (1, 0),
    (0, 14),
    (14, 16),
    (0, 15),
    (15, 17),
];

/// 每个肢体对应的 PAF 通道 (col分量, row分量), 相对热力图通道之后的偏移
pub const COCO_PAIRS_NETWORK: [(usize, usize); 17] = [
    (12, 13),
    (20, 21),
    (14, 15),
    (16, 17),
    (22, 23),
    (24, 25),
    (0, 1),
    (2, 3),
    (4, 5),
    (6, 7),
    (8, 9),
    (10, 11),
    (28, 29),
    (30, 31),
    (34, 35),
    (32, 33),
    (36, 37),
];

/// 绘制用骨架连接
pub const SKELETON_CONNECTIONS: [(usize, usize); 18] = [
    (0, 1),
    (0, 14),
    (14, 16),
    (0, 15),
    (15, 17),
    (2, 3),
    (3, 4),
    (5, 6),
    (6, 7),
    (8, 9),
    (9, 10),
    (11, 12),
    (12, 13),
    (1, 2),
    (1, 5),
    (2, 8),
    (5, 11),
    (8, 11),
];

/// 人体关键点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyPart {
    Nose = 0,
    Neck = 1,
    RShoulder = 2,
    RElbow = 3,
    RWrist = 4,
    LShoulder = 5,
    LElbow = 6,
    LWrist = 7,
    RHip = 8,
    RKnee = 9,
    RAnkle = 10,
    LHip = 11,
    LKnee = 12,
    LAnkle = 13,
    REye = 14,
    LEye = 15,
    REar = 16,
    LEar = 17,
}

impl BodyPart {
    pub const ALL: [BodyPart; PART_COUNT] = [
        BodyPart::Nose,
        BodyPart::Neck,
        BodyPart::RShoulder,
        BodyPart::RElbow,
        BodyPart::RWrist,
        BodyPart::LShoulder,
        BodyPart::LElbow,
        BodyPart::LWrist,
        BodyPart::RHip,
        BodyPart::RKnee,
        BodyPart::RAnkle,
        BodyPart::LHip,
        BodyPart::LKnee,
        BodyPart::LAnkle,
        BodyPart::REye,
        BodyPart::LEye,
        BodyPart::REar,
        BodyPart::LEar,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            BodyPart::Nose => "nose",
            BodyPart::Neck => "neck",
            BodyPart::RShoulder => "rShoulder",
            BodyPart::RElbow => "rElbow",
            BodyPart::RWrist => "rWrist",
            BodyPart::LShoulder => "lShoulder",
            BodyPart::LElbow => "lElbow",
            BodyPart::LWrist => "lWrist",
            BodyPart::RHip => "rHip",
            BodyPart::RKnee => "rKnee",
            BodyPart::RAnkle => "rAnkle",
            BodyPart::LHip => "lHip",
            BodyPart::LKnee => "lKnee",
            BodyPart::LAnkle => "lAnkle",
            BodyPart::REye => "rEye",
            BodyPart::LEye => "lEye",
            BodyPart::REar => "rEar",
            BodyPart::LEar => "lEar",
        }
    }
}

/// OpenPose 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPoseConfig {
    pub input_size: usize,
    pub map_height: usize,
    pub map_width: usize,
    pub heatmap_channels: usize, // 18 个部位 + 背景
    pub paf_channels: usize,
    pub max_pair_count: usize,
    pub nms_window: usize,
    pub nms_threshold: f32,
    pub local_paf_threshold: f32,
    pub part_score_threshold: f32,
    pub paf_count_threshold: usize,
    pub part_count_threshold: usize, // 部位数需严格大于该值
    pub paf_samples: usize,
}

impl Default for OpenPoseConfig {
    fn default() -> Self {
        Self {
            input_size: 368,
            map_height: 46, // 368 / 8
            map_width: 46,
            heatmap_channels: 19,
            paf_channels: 38,
            max_pair_count: 17,
            nms_window: 5,
            nms_threshold: 0.15,
            local_paf_threshold: 0.2,
            part_score_threshold: 0.2,
            paf_count_threshold: 5,
            part_count_threshold: 4,
            paf_samples: 10,
        }
    }
}

impl OpenPoseConfig {
    /// 期望的输出张量形状 [H, W, C]
    pub fn output_shape(&self) -> [usize; 3] {
        [
            self.map_height,
            self.map_width,
            self.heatmap_channels + self.paf_channels,
        ]
    }
}

/// 已分配的关键点 (候选索引 + 热力图坐标)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartSlot {
    pub candidate: usize,
    pub row: usize,
    pub col: usize,
}

/// 单个人体骨架
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Human {
    parts: [Option<PartSlot>; PART_COUNT],
}

impl Human {
    pub fn part(&self, part: BodyPart) -> Option<PartSlot> {
        self.parts[part.index()]
    }

    pub fn parts(&self) -> &[Option<PartSlot>; PART_COUNT] {
        &self.parts
    }

    /// 已分配的部位数
    pub fn part_count(&self) -> usize {
        self.parts.iter().filter(|p| p.is_some()).count()
    }

    pub fn assign(&mut self, part: usize, slot: PartSlot) {
        self.parts[part] = Some(slot);
    }

    fn holds(&self, part: usize, candidate: usize) -> bool {
        matches!(self.parts[part], Some(slot) if slot.candidate == candidate)
    }
}

/// 肢体候选 (端点为各自部位候选列表中的索引)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimbCandidate {
    pub from: usize,
    pub to: usize,
    pub score: f32,
}

/// 每个部位的候选坐标 (row, col), 按行优先发现顺序
pub type PartPeaks = Vec<Vec<(usize, usize)>>;

/// OpenPose 后处理器
pub struct OpenPosePostprocessor {
    config: OpenPoseConfig,
}

impl Default for OpenPosePostprocessor {
    fn default() -> Self {
        Self::new(OpenPoseConfig::default())
    }
}

impl OpenPosePostprocessor {
    pub fn new(config: OpenPoseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OpenPoseConfig {
        &self.config
    }

    /// 完整解码: 峰值 → 肢体评分 → 冲突消解 → 组装 → 过滤
    pub fn decode(&self, output: ArrayView3<f32>) -> Result<Vec<Human>, VisionError> {
        let expected = self.config.output_shape();
        if output.shape() != expected.as_slice() {
            return Err(VisionError::TensorShape {
                expected: expected.to_vec(),
                found: output.shape().to_vec(),
            });
        }

        // PAF 通道需覆盖所用肢体的全部分量
        let pair_count = self.config.max_pair_count.min(COCO_PAIRS.len());
        let paf_needed = COCO_PAIRS_NETWORK[..pair_count]
            .iter()
            .map(|&(col, row)| col.max(row) + 1)
            .max()
            .unwrap_or(0);
        if self.config.paf_channels < paf_needed {
            return Err(VisionError::TensorShape {
                expected: vec![
                    self.config.map_height,
                    self.config.map_width,
                    self.config.heatmap_channels + paf_needed,
                ],
                found: output.shape().to_vec(),
            });
        }

        let peaks = self.find_peaks(output);

        let accepted: Vec<Vec<LimbCandidate>> = (0..pair_count)
            .map(|i| Self::resolve_conflicts(self.score_limbs(output, &peaks, i)))
            .collect();

        let humans = self.assemble(&peaks, &accepted);
        let total = humans.len();
        let humans = self.filter(humans);

        tracing::debug!(
            "姿态解码: 峰值{}个, 骨架{}个 (过滤后{}个)",
            peaks.iter().map(Vec::len).sum::<usize>(),
            total,
            humans.len()
        );
        Ok(humans)
    }

    /// 局部极大值抑制 (窗口在边界处裁剪)
    pub fn find_peaks(&self, output: ArrayView3<f32>) -> PartPeaks {
        let (h, w) = (self.config.map_height, self.config.map_width);
        let radius = (self.config.nms_window.max(1) - 1) / 2;
        let parts = self.config.heatmap_channels.saturating_sub(1).min(PART_COUNT);

        let mut peaks = vec![Vec::new(); parts];
        for (part, found) in peaks.iter_mut().enumerate() {
            for row in 0..h {
                for col in 0..w {
                    let value = output[[row, col, part]];
                    if value <= self.config.nms_threshold {
                        continue;
                    }
                    let mut max_value = 0.0f32;
                    for r in row.saturating_sub(radius)..=(row + radius).min(h - 1) {
                        for c in col.saturating_sub(radius)..=(col + radius).min(w - 1) {
                            max_value = max_value.max(output[[r, c, part]]);
                        }
                    }
                    if value == max_value {
                        found.push((row, col));
                    }
                }
            }
        }
        peaks
    }

    /// 沿两端点连线采样 PAF, 给第 `pair_index` 个肢体的所有候选对评分
    pub fn score_limbs(
        &self,
        output: ArrayView3<f32>,
        peaks: &PartPeaks,
        pair_index: usize,
    ) -> Vec<LimbCandidate> {
        let (part_a, part_b) = COCO_PAIRS[pair_index];
        let (net_col, net_row) = COCO_PAIRS_NETWORK[pair_index];
        let paf_base = self.config.heatmap_channels;
        let samples = self.config.paf_samples.max(2);
        let steps = (samples - 1) as f32;
        let (h, w) = (self.config.map_height, self.config.map_width);

        let (Some(cands_a), Some(cands_b)) = (peaks.get(part_a), peaks.get(part_b)) else {
            return Vec::new();
        };

        let mut limbs = Vec::new();
        for (ia, &(r1, c1)) in cands_a.iter().enumerate() {
            for (ib, &(r2, c2)) in cands_b.iter().enumerate() {
                let d_row = r2 as f32 - r1 as f32;
                let d_col = c2 as f32 - c1 as f32;
                let norm = (d_row * d_row + d_col * d_col).sqrt();
                if norm < 1e-4 {
                    continue;
                }
                let (v_row, v_col) = (d_row / norm, d_col / norm);

                let mut count = 0;
                let mut total = 0.0f32;
                for t in 0..samples {
                    let t = t as f32;
                    let sr = ((r1 as f32 + t * d_row / steps + 0.5) as usize).min(h - 1);
                    let sc = ((c1 as f32 + t * d_col / steps + 0.5) as usize).min(w - 1);
                    let score = v_col * output[[sr, sc, paf_base + net_col]]
                        + v_row * output[[sr, sc, paf_base + net_row]];
                    if score > self.config.local_paf_threshold {
                        count += 1;
                        total += score;
                    }
                }

                if total > self.config.part_score_threshold
                    && count >= self.config.paf_count_threshold
                {
                    limbs.push(LimbCandidate {
                        from: ia,
                        to: ib,
                        score: total,
                    });
                }
            }
        }
        limbs
    }

    /// 按分数降序 (稳定) 贪心接受
    ///
    /// 两端的候选索引记在同一集合里: 任一端索引已出现过 (无论作为哪一端) 即拒绝
    pub fn resolve_conflicts(mut limbs: Vec<LimbCandidate>) -> Vec<LimbCandidate> {
        limbs.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut used: Vec<usize> = Vec::new();
        let mut accepted = Vec::new();
        for limb in limbs {
            if used.contains(&limb.from) || used.contains(&limb.to) {
                continue;
            }
            used.push(limb.from);
            used.push(limb.to);
            accepted.push(limb);
        }
        accepted
    }

    /// 按肢体顺序组装骨架: 与已有骨架共享端点则合并, 否则新建
    pub fn assemble(&self, peaks: &PartPeaks, accepted: &[Vec<LimbCandidate>]) -> Vec<Human> {
        let mut humans: Vec<Human> = Vec::new();

        for (pair_index, limbs) in accepted.iter().enumerate() {
            let (part_a, part_b) = COCO_PAIRS[pair_index];
            for limb in limbs {
                let slot_a = slot(peaks, part_a, limb.from);
                let slot_b = slot(peaks, part_b, limb.to);

                let owner = humans
                    .iter()
                    .position(|h| h.holds(part_a, limb.from) || h.holds(part_b, limb.to));
                let human = match owner {
                    Some(k) => &mut humans[k],
                    None => {
                        humans.push(Human::default());
                        let last = humans.len() - 1;
                        &mut humans[last]
                    }
                };
                human.assign(part_a, slot_a);
                human.assign(part_b, slot_b);
            }
        }
        humans
    }

    /// 去除部位数不足的骨架
    pub fn filter(&self, humans: Vec<Human>) -> Vec<Human> {
        humans
            .into_iter()
            .filter(|h| h.part_count() > self.config.part_count_threshold)
            .collect()
    }
}

fn slot(peaks: &PartPeaks, part: usize, candidate: usize) -> PartSlot {
    let (row, col) = peaks[part][candidate];
    PartSlot {
        candidate,
        row,
        col,
    }
}
