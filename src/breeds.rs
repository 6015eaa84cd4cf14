//! Breed source directory and catalog key matching.
//!
//! Maps breed names to the lookup keys the species catalogs understand:
//! dog.ceo breed paths (`retriever/golden`) for dogs and TheCatAPI breed ids
//! (`mcoo`) for cats.
//!
//! # Matching
//!
//! 1. A name that equals a known identity, display name or alias maps to
//!    that breed's key with confidence 100.
//! 2. Otherwise the name is matched word by word against every catalog key
//!    of the species:
//!    - every word of the name present in the key → confidence
//!      `100 * |name| / |key|` (100 on an exact match);
//!    - every word of the key present in the name (a generic parent key such
//!      as `retriever` for "Flat Coated Retriever") → a lower confidence;
//!    - anything else is no match.
//!
//!    Ties prefer the more specific sub-key (`retriever/golden` over
//!    `retriever`), then the alphabetically first key.
//!
//! The confidence only ranks keys. It says nothing about whether the image a
//! catalog returns is actually correct; that is the verifier's job.

use serde::Serialize;

use crate::cache::slugify;
use crate::models::{BreedQuery, Species};

/// A curated breed with its catalog key and accepted spellings.
#[derive(Debug, Clone, Copy)]
pub struct BreedEntry {
    pub identity: &'static str,
    pub display_name: &'static str,
    pub species: Species,
    pub aliases: &'static [&'static str],
    pub catalog_key: Option<&'static str>,
}

/// Result of a catalog key lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogMatch {
    pub key: String,
    pub confidence: u8,
    /// True when the key names a specific variety rather than a parent group.
    pub specific: bool,
}

#[derive(Debug, Clone)]
struct CatalogKey {
    key: String,
    tokens: Vec<String>,
    specific: bool,
}

const fn dog(
    identity: &'static str,
    display_name: &'static str,
    aliases: &'static [&'static str],
    key: &'static str,
) -> BreedEntry {
    BreedEntry {
        identity,
        display_name,
        species: Species::Dog,
        aliases,
        catalog_key: Some(key),
    }
}

const fn cat(
    identity: &'static str,
    display_name: &'static str,
    aliases: &'static [&'static str],
    key: &'static str,
) -> BreedEntry {
    BreedEntry {
        identity,
        display_name,
        species: Species::Cat,
        aliases,
        catalog_key: Some(key),
    }
}

/// Popular breeds, in rough popularity order. Also the default pre-warm list.
static BREEDS: &[BreedEntry] = &[
    dog("labrador-retriever", "Labrador Retriever", &["labrador", "lab"], "labrador"),
    dog("golden-retriever", "Golden Retriever", &["golden"], "retriever/golden"),
    dog("german-shepherd", "German Shepherd", &["alsatian", "german shepherd dog"], "germanshepherd"),
    dog("french-bulldog", "French Bulldog", &["frenchie"], "bulldog/french"),
    dog("english-bulldog", "English Bulldog", &["bulldog", "british bulldog"], "bulldog/english"),
    dog("poodle", "Poodle", &["standard poodle"], "poodle/standard"),
    dog("toy-poodle", "Toy Poodle", &[], "poodle/toy"),
    dog("beagle", "Beagle", &[], "beagle"),
    dog("rottweiler", "Rottweiler", &["rottie"], "rottweiler"),
    dog("german-shorthaired-pointer", "German Shorthaired Pointer", &[], "pointer/german"),
    dog("dachshund", "Dachshund", &["sausage dog", "wiener dog"], "dachshund"),
    dog("pembroke-welsh-corgi", "Pembroke Welsh Corgi", &["corgi", "pembroke"], "pembroke"),
    dog("cardigan-welsh-corgi", "Cardigan Welsh Corgi", &[], "corgi/cardigan"),
    dog("australian-shepherd", "Australian Shepherd", &["aussie"], "australian/shepherd"),
    dog("yorkshire-terrier", "Yorkshire Terrier", &["yorkie"], "terrier/yorkshire"),
    dog("boxer", "Boxer", &[], "boxer"),
    dog("great-dane", "Great Dane", &[], "dane/great"),
    dog("siberian-husky", "Siberian Husky", &["husky"], "husky"),
    dog("cavalier-king-charles-spaniel", "Cavalier King Charles Spaniel", &["cavalier", "blenheim spaniel"], "spaniel/blenheim"),
    dog("doberman-pinscher", "Doberman Pinscher", &["doberman", "dobermann"], "doberman"),
    dog("miniature-schnauzer", "Miniature Schnauzer", &[], "schnauzer/miniature"),
    dog("shih-tzu", "Shih Tzu", &["shihtzu"], "shihtzu"),
    dog("boston-terrier", "Boston Terrier", &["boston bulldog"], "bulldog/boston"),
    dog("bernese-mountain-dog", "Bernese Mountain Dog", &["berner"], "mountain/bernese"),
    dog("pomeranian", "Pomeranian", &["pom"], "pomeranian"),
    dog("border-collie", "Border Collie", &[], "collie/border"),
    dog("cocker-spaniel", "Cocker Spaniel", &[], "spaniel/cocker"),
    dog("chihuahua", "Chihuahua", &[], "chihuahua"),
    dog("pug", "Pug", &[], "pug"),
    dog("shetland-sheepdog", "Shetland Sheepdog", &["sheltie"], "sheepdog/shetland"),
    dog("maltese", "Maltese", &[], "maltese"),
    dog("shiba-inu", "Shiba Inu", &["shiba"], "shiba"),
    dog("akita", "Akita", &[], "akita"),
    dog("saint-bernard", "Saint Bernard", &["st bernard", "st. bernard"], "stbernard"),
    dog("newfoundland", "Newfoundland", &["newfie"], "newfoundland"),
    dog("dalmatian", "Dalmatian", &[], "dalmatian"),
    dog("vizsla", "Vizsla", &["hungarian vizsla"], "vizsla"),
    dog("weimaraner", "Weimaraner", &[], "weimaraner"),
    dog("whippet", "Whippet", &[], "whippet"),
    dog("samoyed", "Samoyed", &["sammy"], "samoyed"),
    cat("maine-coon", "Maine Coon", &["maine coon cat"], "mcoo"),
    cat("ragdoll", "Ragdoll", &[], "ragd"),
    cat("persian", "Persian", &["persian longhair"], "pers"),
    cat("british-shorthair", "British Shorthair", &["british blue"], "bsho"),
    cat("siamese", "Siamese", &[], "siam"),
    cat("bengal", "Bengal", &[], "beng"),
    cat("sphynx", "Sphynx", &["sphinx", "hairless cat"], "sphy"),
    cat("abyssinian", "Abyssinian", &["aby"], "abys"),
    cat("scottish-fold", "Scottish Fold", &[], "sfol"),
    cat("russian-blue", "Russian Blue", &[], "rblu"),
    cat("norwegian-forest-cat", "Norwegian Forest Cat", &["wegie", "norwegian forest"], "norw"),
    cat("american-shorthair", "American Shorthair", &[], "asho"),
    cat("birman", "Birman", &["sacred cat of burma"], "birm"),
    cat("devon-rex", "Devon Rex", &[], "drex"),
    cat("cornish-rex", "Cornish Rex", &[], "crex"),
    cat("exotic-shorthair", "Exotic Shorthair", &["exotic"], "esho"),
    cat("himalayan", "Himalayan", &["himmie"], "hima"),
    cat("savannah", "Savannah", &[], "sava"),
    cat("siberian", "Siberian", &["siberian forest cat"], "sibe"),
    cat("bombay", "Bombay", &[], "bomb"),
];

/// dog.ceo breed paths. Parent keys of sub-breeds are derived.
static DOG_CATALOG: &[&str] = &[
    "affenpinscher", "african", "airedale", "akita", "appenzeller", "australian/shepherd",
    "basenji", "beagle", "bluetick", "borzoi", "bouvier", "boxer", "brabancon", "briard",
    "buhund/norwegian", "bulldog/boston", "bulldog/english", "bulldog/french",
    "bullterrier/staffordshire", "cattledog/australian", "chihuahua", "chow", "clumber",
    "cockapoo", "collie/border", "coonhound", "corgi/cardigan", "cotondetulear", "dachshund",
    "dalmatian", "dane/great", "deerhound/scottish", "dhole", "dingo", "doberman",
    "elkhound/norwegian", "entlebucher", "eskimo", "finnish/lapphund", "frise/bichon",
    "germanshepherd", "greyhound/italian", "groenendael", "havanese", "hound/afghan",
    "hound/basset", "hound/blood", "hound/english", "hound/ibizan", "hound/plott",
    "hound/walker", "husky", "keeshond", "kelpie", "komondor", "kuvasz", "labradoodle",
    "labrador", "leonberg", "lhasa", "malamute", "malinois", "maltese", "mastiff/bull",
    "mastiff/english", "mastiff/tibetan", "mexicanhairless", "mix", "mountain/bernese",
    "mountain/swiss", "newfoundland", "otterhound", "ovcharka/caucasian", "papillon",
    "pekinese", "pembroke", "pinscher/miniature", "pitbull", "pointer/german",
    "pointer/germanlonghair", "pomeranian", "poodle/medium", "poodle/miniature",
    "poodle/standard", "poodle/toy", "pug", "puggle", "pyrenees", "redbone",
    "retriever/chesapeake", "retriever/curly", "retriever/flatcoated", "retriever/golden",
    "ridgeback/rhodesian", "rottweiler", "saluki", "samoyed", "schipperke", "schnauzer/giant",
    "schnauzer/miniature", "segugio/italian", "setter/english", "setter/gordon",
    "setter/irish", "sharpei", "sheepdog/english", "sheepdog/shetland", "shiba", "shihtzu",
    "spaniel/blenheim", "spaniel/brittany", "spaniel/cocker", "spaniel/irish",
    "spaniel/japanese", "spaniel/sussex", "spaniel/welsh", "spitz/japanese",
    "springer/english", "stbernard", "terrier/american", "terrier/australian",
    "terrier/bedlington", "terrier/border", "terrier/cairn", "terrier/dandie", "terrier/fox",
    "terrier/irish", "terrier/kerryblue", "terrier/lakeland", "terrier/norfolk",
    "terrier/norwich", "terrier/patterdale", "terrier/russell", "terrier/scottish",
    "terrier/sealyham", "terrier/silky", "terrier/tibetan", "terrier/toy", "terrier/welsh",
    "terrier/westhighland", "terrier/wheaten", "terrier/yorkshire", "tervuren", "vizsla",
    "waterdog/spanish", "weimaraner", "whippet", "wolfhound/irish",
];

/// TheCatAPI breed ids and names.
static CAT_CATALOG: &[(&str, &str)] = &[
    ("abys", "Abyssinian"), ("aege", "Aegean"), ("abob", "American Bobtail"),
    ("acur", "American Curl"), ("asho", "American Shorthair"), ("awir", "American Wirehair"),
    ("amau", "Arabian Mau"), ("amis", "Australian Mist"), ("bali", "Balinese"),
    ("bamb", "Bambino"), ("beng", "Bengal"), ("birm", "Birman"), ("bomb", "Bombay"),
    ("bslo", "British Longhair"), ("bsho", "British Shorthair"), ("bure", "Burmese"),
    ("buri", "Burmilla"), ("cspa", "California Spangled"), ("ctif", "Chantilly Tiffany"),
    ("char", "Chartreux"), ("chau", "Chausie"), ("chee", "Cheetoh"),
    ("csho", "Colorpoint Shorthair"), ("crex", "Cornish Rex"), ("cymr", "Cymric"),
    ("cypr", "Cyprus"), ("drex", "Devon Rex"), ("dons", "Donskoy"), ("lihu", "Dragon Li"),
    ("emau", "Egyptian Mau"), ("ebur", "European Burmese"), ("esho", "Exotic Shorthair"),
    ("hbro", "Havana Brown"), ("hima", "Himalayan"), ("jbob", "Japanese Bobtail"),
    ("java", "Javanese"), ("khao", "Khao Manee"), ("kora", "Korat"), ("kuri", "Kurilian"),
    ("lape", "LaPerm"), ("mcoo", "Maine Coon"), ("mala", "Malayan"), ("manx", "Manx"),
    ("munc", "Munchkin"), ("nebe", "Nebelung"), ("norw", "Norwegian Forest Cat"),
    ("ocic", "Ocicat"), ("orie", "Oriental"), ("pers", "Persian"), ("pixi", "Pixie-bob"),
    ("raga", "Ragamuffin"), ("ragd", "Ragdoll"), ("rblu", "Russian Blue"),
    ("sava", "Savannah"), ("sfol", "Scottish Fold"), ("srex", "Selkirk Rex"),
    ("siam", "Siamese"), ("sibe", "Siberian"), ("sing", "Singapura"), ("snow", "Snowshoe"),
    ("soma", "Somali"), ("sphy", "Sphynx"), ("tonk", "Tonkinese"), ("toyg", "Toyger"),
    ("tang", "Turkish Angora"), ("tvan", "Turkish Van"), ("ycho", "York Chocolate"),
];

/// Words that say nothing about which breed is meant.
const STOP_WORDS: &[&str] = &["dog", "dogs", "cat", "cats", "the", "a", "an", "of", "breed"];

/// Lowercase alphanumeric words of `s`, minus stop words.
pub fn tokenize(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_lowercase())
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Read-only breed directory.
pub struct SourceDirectory {
    entries: &'static [BreedEntry],
    dog_keys: Vec<CatalogKey>,
    cat_keys: Vec<CatalogKey>,
}

impl Default for SourceDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceDirectory {
    pub fn new() -> Self {
        Self {
            entries: BREEDS,
            dog_keys: dog_catalog_keys(DOG_CATALOG),
            cat_keys: CAT_CATALOG
                .iter()
                .map(|(id, name)| CatalogKey {
                    key: id.to_string(),
                    tokens: tokenize(name),
                    specific: true,
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[BreedEntry] {
        self.entries
    }

    /// Find a curated entry by identity, display name or alias.
    pub fn entry(&self, species: Species, name: &str) -> Option<&BreedEntry> {
        let wanted = slugify(name);
        if wanted.is_empty() {
            return None;
        }
        self.entries.iter().find(|e| {
            e.species == species
                && (e.identity == wanted
                    || slugify(e.display_name) == wanted
                    || e.aliases.iter().any(|a| slugify(a) == wanted))
        })
    }

    /// Canonical query for a free-text name: curated entries keep their
    /// identity so every spelling shares one cache file.
    pub fn canonical_query(&self, name: &str, species: Species) -> BreedQuery {
        match self.entry(species, name) {
            Some(e) => BreedQuery::new(e.identity, species, e.display_name),
            None => BreedQuery::from_name(name, species),
        }
    }

    /// Best catalog key for `query`, if any.
    pub fn lookup(&self, query: &BreedQuery) -> Option<CatalogMatch> {
        for name in [query.identity.as_str(), query.display_name.as_str()] {
            if let Some(key) = self.entry(query.species, name).and_then(|e| e.catalog_key) {
                return Some(CatalogMatch {
                    key: key.to_string(),
                    confidence: 100,
                    specific: true,
                });
            }
        }

        let name = if query.display_name.trim().is_empty() {
            &query.identity
        } else {
            &query.display_name
        };
        let keys = match query.species {
            Species::Dog => &self.dog_keys,
            Species::Cat => &self.cat_keys,
        };
        best_match(&tokenize(name), keys)
    }

    /// Curated breeds of one species (or all), as queries.
    pub fn popular(&self, species: Option<Species>) -> Vec<BreedQuery> {
        self.entries
            .iter()
            .filter(|e| species.map_or(true, |s| e.species == s))
            .map(|e| BreedQuery::new(e.identity, e.species, e.display_name))
            .collect()
    }
}

fn dog_catalog_keys(paths: &[&str]) -> Vec<CatalogKey> {
    let mut keys: Vec<CatalogKey> = Vec::with_capacity(paths.len() + 32);
    let mut parents: Vec<&str> = Vec::new();
    for path in paths {
        let tokens: Vec<String> = path.split('/').map(|s| s.to_string()).collect();
        if let Some((parent, _)) = path.split_once('/') {
            if !parents.contains(&parent) {
                parents.push(parent);
            }
        }
        keys.push(CatalogKey {
            key: path.to_string(),
            specific: tokens.len() > 1,
            tokens,
        });
    }
    for parent in parents {
        if !keys.iter().any(|k| k.key == parent) {
            keys.push(CatalogKey {
                key: parent.to_string(),
                tokens: vec![parent.to_string()],
                specific: false,
            });
        }
    }
    keys
}

fn score(query: &[String], key: &CatalogKey) -> Option<u8> {
    if query.is_empty() {
        return None;
    }

    let in_key = query.iter().filter(|w| key.tokens.contains(w)).count();
    if in_key == query.len() {
        return Some((100 * query.len() / key.tokens.len().max(1)).min(100) as u8);
    }

    // Compound catalog keys ("germanshepherd", "stbernard") match the joined name.
    let key_joined: String = key.tokens.concat();
    if query.concat() == key_joined {
        return Some(100);
    }
    let reversed: String = query.iter().rev().map(|s| s.as_str()).collect();
    if reversed == key_joined {
        return Some(95);
    }
    None
}

fn best_match(query: &[String], keys: &[CatalogKey]) -> Option<CatalogMatch> {
    keys.iter()
        .filter_map(|k| score(query, k).map(|s| (s, k)))
        .max_by(|(sa, ka), (sb, kb)| {
            sa.cmp(sb)
                .then(ka.specific.cmp(&kb.specific))
                .then(kb.key.cmp(&ka.key))
        })
        .map(|(confidence, k)| CatalogMatch {
            key: k.key.clone(),
            confidence,
            specific: k.specific,
        })
}
