// Static disease catalog used by the synthetic path

/// Name of the sentinel entry for a healthy plant
pub const HEALTHY: &str = "健康";

/// Crop used when the requested one is unknown
pub const DEFAULT_CROP: &str = "rice";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiseaseEntry {
    pub name: &'static str,
    pub symptoms: &'static str,
    pub solution: &'static str,
}

impl DiseaseEntry {
    const fn new(name: &'static str, symptoms: &'static str, solution: &'static str) -> Self {
        Self {
            name,
            symptoms,
            solution,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.name == HEALTHY
    }
}

/// One crop and its ordered disease entries
#[derive(Debug, Clone)]
pub struct CropProfile {
    /// Canonical identifier (rice, wheat, maize)
    pub id: &'static str,
    /// Display label used in prompts and summaries
    pub label: &'static str,
    /// Other accepted identifiers
    pub aliases: &'static [&'static str],
    pub entries: Vec<DiseaseEntry>,
}

impl CropProfile {
    fn matches(&self, crop: &str) -> bool {
        let crop = crop.trim();
        self.id.eq_ignore_ascii_case(crop)
            || self.label == crop
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(crop))
    }

    pub fn healthy(&self) -> Option<&DiseaseEntry> {
        self.entries.iter().find(|e| e.is_healthy())
    }

    pub fn diseases(&self) -> Vec<&DiseaseEntry> {
        self.entries.iter().filter(|e| !e.is_healthy()).collect()
    }
}

/// Crop → disease entries. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct DiseaseCatalog {
    crops: Vec<CropProfile>,
}

impl DiseaseCatalog {
    pub fn builtin() -> Self {
        Self {
            crops: vec![
                CropProfile {
                    id: "rice",
                    label: "水稻",
                    aliases: &["paddy"],
                    entries: vec![
                        DiseaseEntry::new("稻瘟病", "叶片有梭形病斑", "使用三环唑防治"),
                        DiseaseEntry::new("纹枯病", "基部有云纹状病斑", "使用井冈霉素"),
                        DiseaseEntry::new("白叶枯病", "叶片边缘枯黄", "使用叶枯唑"),
                        DiseaseEntry::new(HEALTHY, "叶片绿色健康", "保持良好管理"),
                    ],
                },
                CropProfile {
                    id: "wheat",
                    label: "小麦",
                    aliases: &[],
                    entries: vec![
                        DiseaseEntry::new("锈病", "叶片有锈色粉状物", "使用粉锈宁"),
                        DiseaseEntry::new("赤霉病", "穗部有粉红色霉层", "使用多菌灵"),
                        DiseaseEntry::new(HEALTHY, "植株健康，长势良好", "保持当前管理"),
                    ],
                },
                CropProfile {
                    id: "maize",
                    label: "玉米",
                    aliases: &["corn"],
                    entries: vec![
                        DiseaseEntry::new("玉米大斑病", "叶片出现大型黄褐色病斑", "使用代森锰锌"),
                        DiseaseEntry::new("玉米锈病", "叶片有橙黄色粉状孢子堆", "使用三唑酮"),
                        DiseaseEntry::new(HEALTHY, "植株健壮，叶片浓绿", "正常管理"),
                    ],
                },
            ],
        }
    }

    /// Exact lookup by id, label or alias
    pub fn lookup(&self, crop: &str) -> Option<&CropProfile> {
        self.crops.iter().find(|c| c.matches(crop))
    }

    /// Lookup that falls back to the default crop
    pub fn resolve(&self, crop: &str) -> &CropProfile {
        self.lookup(crop)
            .or_else(|| self.lookup(DEFAULT_CROP))
            .unwrap_or(&self.crops[0])
    }

    pub fn crops(&self) -> &[CropProfile] {
        &self.crops
    }
}

impl Default for DiseaseCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
