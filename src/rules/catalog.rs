//! Static category catalog
//!
//! Every toggle a [`RuleSet`](super::RuleSet) can enable is a row in one of the
//! tables below. A category is a list of named items, each carrying the keywords
//! that identify it, plus the generic terms its "remove all" master adds on top.
//! Rule evaluation walks these tables instead of hand-written conditionals.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How an item's keywords are matched against lower-cased entry text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Plain substring containment
    Substring,
    /// Substring bounded by non-word characters on both sides
    WholeWord,
}

/// A single toggleable item within a category
#[derive(Debug, Clone, Copy)]
pub struct CatalogItem {
    pub key: &'static str,
    pub keywords: &'static [&'static str],
    pub kind: MatchKind,
}

/// One category of toggles
#[derive(Debug, Clone, Copy)]
pub struct CategorySpec {
    pub id: CategoryId,
    /// Terms only evaluated when the category master is enabled
    pub generic_terms: &'static [&'static str],
    pub generic_kind: MatchKind,
    pub items: &'static [CatalogItem],
}

impl CategorySpec {
    pub fn item(&self, key: &str) -> Option<&'static CatalogItem> {
        self.items.iter().find(|item| item.key == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryId {
    Regions,
    News,
    Sports,
    SportTypes,
    Music,
    Kids,
    Reality,
}

impl CategoryId {
    /// Categories evaluated after the ancillary toggles, in evaluation order
    pub const CONTENT_ORDER: [CategoryId; 6] = [
        CategoryId::News,
        CategoryId::Sports,
        CategoryId::SportTypes,
        CategoryId::Music,
        CategoryId::Kids,
        CategoryId::Reality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryId::Regions => "regions",
            CategoryId::News => "news",
            CategoryId::Sports => "sports",
            CategoryId::SportTypes => "sport_types",
            CategoryId::Music => "music",
            CategoryId::Kids => "kids",
            CategoryId::Reality => "reality",
        }
    }

    pub fn spec(&self) -> &'static CategorySpec {
        match self {
            CategoryId::Regions => &REGIONS,
            CategoryId::News => &NEWS,
            CategoryId::Sports => &SPORTS,
            CategoryId::SportTypes => &SPORT_TYPES,
            CategoryId::Music => &MUSIC,
            CategoryId::Kids => &KIDS,
            CategoryId::Reality => &REALITY,
        }
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keywords for the hide-radio toggle
pub const RADIO_KEYWORDS: &[&str] = &["radio", "music"];

/// Keywords for the hide-encrypted toggle
pub const ENCRYPTED_KEYWORDS: &[&str] = &["drm", "encrypt"];

const fn sub(key: &'static str, keywords: &'static [&'static str]) -> CatalogItem {
    CatalogItem {
        key,
        keywords,
        kind: MatchKind::Substring,
    }
}

const fn word(key: &'static str, keywords: &'static [&'static str]) -> CatalogItem {
    CatalogItem {
        key,
        keywords,
        kind: MatchKind::WholeWord,
    }
}

// Short country/language codes collide with ordinary words, so the whole
// region table is whole-word matched.
pub static REGIONS: CategorySpec = CategorySpec {
    id: CategoryId::Regions,
    generic_terms: &[],
    generic_kind: MatchKind::WholeWord,
    items: &[
        word("arabic", &["ar", "arabic", "arab", "ksa", "uae"]),
        word("french", &["fr", "french", "france"]),
        word("german", &["de", "german", "germany", "deutsch"]),
        word("spanish", &["es", "spanish", "spain", "latino"]),
        word("portuguese", &["pt", "portuguese", "portugal", "br", "brazil"]),
        word("italian", &["ita", "italian", "italy"]),
        word("turkish", &["tr", "turkish", "turkey"]),
        word("indian", &["ind", "hindi", "india", "tamil", "telugu"]),
        word("polish", &["pl", "polish", "poland"]),
        word("russian", &["ru", "russian", "russia"]),
        word("dutch", &["nl", "dutch", "netherlands"]),
        word("greek", &["gr", "greek", "greece"]),
        word("chinese", &["cn", "chinese", "china"]),
        word("korean", &["kr", "korean", "korea"]),
    ],
};

pub static NEWS: CategorySpec = CategorySpec {
    id: CategoryId::News,
    generic_terms: &["news", "weather"],
    generic_kind: MatchKind::Substring,
    items: &[
        sub("fox_news", &["fox news"]),
        sub("cnn", &["cnn"]),
        sub("msnbc", &["msnbc"]),
        sub("bbc_news", &["bbc news"]),
        sub("sky_news", &["sky news"]),
        sub("cnbc", &["cnbc"]),
        sub("bloomberg", &["bloomberg"]),
        sub("newsmax", &["newsmax"]),
        sub("weather_channel", &["weather channel"]),
        sub("al_jazeera", &["al jazeera", "aljazeera"]),
    ],
};

pub static SPORTS: CategorySpec = CategorySpec {
    id: CategoryId::Sports,
    generic_terms: &["sport", "ppv"],
    generic_kind: MatchKind::Substring,
    items: &[
        sub("espn", &["espn"]),
        sub("fox_sports", &["fox sports", "fs1", "fs2"]),
        sub("nbc_sports", &["nbc sports", "nbcsn"]),
        sub("cbs_sports", &["cbs sports"]),
        sub("bein_sports", &["bein"]),
        sub("sky_sports", &["sky sports"]),
        sub("tnt_sports", &["tnt sports"]),
        sub("dazn", &["dazn"]),
        sub("nfl_network", &["nfl network"]),
        sub("nba_tv", &["nba tv"]),
        sub("mlb_network", &["mlb network"]),
        sub("nhl_network", &["nhl network"]),
        sub("golf_channel", &["golf channel"]),
        sub("tennis_channel", &["tennis channel"]),
        sub("eurosport", &["eurosport"]),
        sub("sportsnet", &["sportsnet"]),
    ],
};

// No generic terms: these are independent of the sports master.
pub static SPORT_TYPES: CategorySpec = CategorySpec {
    id: CategoryId::SportTypes,
    generic_terms: &[],
    generic_kind: MatchKind::Substring,
    items: &[
        sub("baseball", &["baseball", "mlb"]),
        sub("basketball", &["basketball", "nba"]),
        sub("football", &["football", "nfl", "ncaaf"]),
        sub("soccer", &["soccer", "premier league", "la liga", "bundesliga", "serie a"]),
        sub("hockey", &["hockey", "nhl"]),
        sub("golf", &["golf", "pga"]),
        sub("fishing", &["fishing", "angler"]),
        sub("boxing", &["boxing"]),
        sub("swimming", &["swimming"]),
        sub("combat_sports", &["ufc", "mma", "wrestling", "wwe", "kickboxing"]),
    ],
};

pub static MUSIC: CategorySpec = CategorySpec {
    id: CategoryId::Music,
    generic_terms: &["music"],
    generic_kind: MatchKind::Substring,
    items: &[
        // networks
        sub("mtv", &["mtv"]),
        sub("vh1", &["vh1"]),
        sub("cmt", &["cmt"]),
        sub("bet_music", &["bet jams", "bet soul", "bet hip hop"]),
        sub("vevo", &["vevo"]),
        sub("stingray", &["stingray"]),
        sub("music_choice", &["music choice"]),
        sub("fuse", &["fuse tv", "fuse hd"]),
        sub("revolt", &["revolt"]),
        sub("axs_tv", &["axs tv"]),
        sub("qello", &["qello"]),
        sub("clubland", &["clubland"]),
        sub("kerrang", &["kerrang"]),
        sub("kiss_tv", &["kiss tv"]),
        sub("the_box", &["the box"]),
        sub("trace", &["trace urban", "trace tropical", "trace latina"]),
        sub("mezzo", &["mezzo"]),
        sub("medici", &["medici"]),
        sub("xite", &["xite"]),
        sub("four_music", &["4music"]),
        sub("capital_tv", &["capital tv"]),
        sub("heart_tv", &["heart tv"]),
        sub("country_network", &["country network"]),
        sub("gospel_music_channel", &["gospel music channel"]),
        sub("classic_arts", &["classic arts showcase"]),
        sub("jukebox", &["jukebox"]),
        // genres
        word("pop", &["pop"]),
        word("rock", &["rock"]),
        word("hip_hop", &["hip hop", "hip-hop", "rap"]),
        word("rnb", &["r&b", "rnb"]),
        word("jazz", &["jazz"]),
        word("blues", &["blues"]),
        word("classical", &["classical"]),
        word("country", &["country"]),
        word("metal", &["metal"]),
        word("punk", &["punk"]),
        word("indie", &["indie"]),
        word("alternative", &["alternative"]),
        word("electronic", &["electronic", "edm"]),
        word("dance", &["dance"]),
        word("house", &["house music"]),
        word("techno", &["techno"]),
        word("trance", &["trance"]),
        word("reggae", &["reggae"]),
        word("reggaeton", &["reggaeton"]),
        word("salsa", &["salsa"]),
        word("kpop", &["k-pop", "kpop"]),
        word("jpop", &["j-pop", "jpop"]),
        word("soul", &["soul"]),
        word("funk", &["funk"]),
        word("disco", &["disco"]),
        word("gospel", &["gospel"]),
        word("opera", &["opera"]),
        word("folk", &["folk"]),
        word("dubstep", &["dubstep"]),
        word("drum_and_bass", &["drum and bass", "dnb"]),
        word("lofi", &["lofi", "lo-fi"]),
        word("oldies", &["oldies"]),
        word("karaoke", &["karaoke"]),
        word("ambient", &["ambient"]),
    ],
};

pub static KIDS: CategorySpec = CategorySpec {
    id: CategoryId::Kids,
    generic_terms: &["kids", "children"],
    generic_kind: MatchKind::Substring,
    items: &[
        sub("disney_junior", &["disney junior", "disney jr"]),
        sub("nick_jr", &["nick jr"]),
        sub("nickelodeon", &["nickelodeon"]),
        sub("cartoon_network", &["cartoon network"]),
        sub("boomerang", &["boomerang"]),
        sub("baby_tv", &["baby tv", "babytv"]),
        sub("pbs_kids", &["pbs kids"]),
        sub("cbeebies", &["cbeebies"]),
        sub("universal_kids", &["universal kids"]),
        sub("duck_tv", &["duck tv"]),
    ],
};

pub static REALITY: CategorySpec = CategorySpec {
    id: CategoryId::Reality,
    generic_terms: &["reality"],
    generic_kind: MatchKind::Substring,
    items: &[
        sub("big_brother", &["big brother"]),
        sub("survivor", &["survivor"]),
        sub("love_island", &["love island"]),
        sub("bachelor", &["bachelor"]),
        sub("kardashians", &["kardashian"]),
        sub("real_housewives", &["real housewives"]),
        sub("jersey_shore", &["jersey shore"]),
        sub("below_deck", &["below deck"]),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_item_keys_unique_per_category() {
        for id in std::iter::once(CategoryId::Regions).chain(CategoryId::CONTENT_ORDER) {
            let spec = id.spec();
            let keys: HashSet<_> = spec.items.iter().map(|i| i.key).collect();
            assert_eq!(keys.len(), spec.items.len(), "duplicate key in {id}");
            assert_eq!(spec.id, id);
        }
    }

    #[test]
    fn test_keywords_are_lower_case() {
        for id in std::iter::once(CategoryId::Regions).chain(CategoryId::CONTENT_ORDER) {
            let spec = id.spec();
            let all = spec
                .items
                .iter()
                .flat_map(|i| i.keywords.iter())
                .chain(spec.generic_terms.iter());
            for keyword in all {
                assert_eq!(*keyword, keyword.to_lowercase());
            }
        }
    }

    #[test]
    fn test_catalog_sizes() {
        let region_tokens: usize = REGIONS.items.iter().map(|i| i.keywords.len()).sum();
        assert!(region_tokens >= 40);
        assert_eq!(NEWS.items.len(), 10);
        assert_eq!(SPORTS.items.len(), 16);
        assert_eq!(SPORT_TYPES.items.len(), 10);
        let networks = MUSIC.items.iter().filter(|i| i.kind == MatchKind::Substring).count();
        let genres = MUSIC.items.iter().filter(|i| i.kind == MatchKind::WholeWord).count();
        assert_eq!(networks, 26);
        assert_eq!(genres, 34);
    }

    #[test]
    fn test_item_lookup() {
        assert!(NEWS.item("fox_news").is_some());
        assert!(NEWS.item("espn").is_none());
    }
}
