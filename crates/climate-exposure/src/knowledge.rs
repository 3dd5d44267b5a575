//! Compiled-in climate knowledge base
//!
//! Maps canonical destination keys to physical-climate risk profiles and
//! holds the alias table used to fold foreign names, codes and common
//! spellings onto those keys.
//!
//! Keys are stored ASCII-folded and lowercase. Declaration order matters:
//! resolution walks profiles and aliases in the order they were added.

use crate::resolver::normalize;
use crate::{Coordinates, Hemisphere, UNKNOWN_BASE_SCORE, SCORE_MAX, SCORE_MIN};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

pub const AFRIQUE: &str = "Afrique";
pub const ASIE: &str = "Asie";
pub const EUROPE: &str = "Europe";
pub const EUROPE_POLAIRE: &str = "Europe/Polaire";
pub const AMERIQUE: &str = "Amérique";
pub const OCEANIE: &str = "Océanie";

/// Key reported by the fallback profile
pub const UNKNOWN_KEY: &str = "unknown";

/// Cause reported by the fallback profile
pub const UNKNOWN_CAUSE: &str = "unknown";

/// Region reported by the fallback profile
pub const UNKNOWN_REGION: &str = "other";

static GLOBAL: OnceLock<KnowledgeBase> = OnceLock::new();

/// Physical-climate vulnerability profile of one destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    /// Canonical lowercase ASCII key
    pub key: String,
    /// Absent only for the unknown profile
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    /// Non-seasonal vulnerability baseline (0-100)
    pub base_score: f64,
    /// Dominant physical risk
    pub cause: String,
    pub hemisphere: Hemisphere,
    /// Macro-region used for substitution
    pub region: String,
}

impl RiskProfile {
    /// Fallback returned when no key matches
    pub fn unknown() -> Self {
        Self {
            key: UNKNOWN_KEY.to_string(),
            coordinates: None,
            base_score: UNKNOWN_BASE_SCORE,
            cause: UNKNOWN_CAUSE.to_string(),
            hemisphere: Hemisphere::North,
            region: UNKNOWN_REGION.to_string(),
        }
    }

    /// Resolved profiles carry coordinates, the fallback does not
    pub fn is_resolved(&self) -> bool {
        self.coordinates.is_some()
    }
}

/// Read-only table of risk profiles and aliases
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    profiles: Vec<RiskProfile>,
    aliases: Vec<(String, String)>,
    unknown: RiskProfile,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeBase {
    /// Create an empty knowledge base
    pub fn new() -> Self {
        Self {
            profiles: Vec::new(),
            aliases: Vec::new(),
            unknown: RiskProfile::unknown(),
        }
    }

    /// Create the built-in destination table
    pub fn with_defaults() -> Self {
        let mut kb = Self::new();
        kb.load_default_data();
        kb.load_default_aliases();
        kb
    }

    /// Process-wide shared instance, built on first use
    pub fn global() -> &'static KnowledgeBase {
        GLOBAL.get_or_init(KnowledgeBase::with_defaults)
    }

    /// Load the built-in destination profiles
    #[rustfmt::skip]
    pub fn load_default_data(&mut self) {
        // Afrique: drought and heat dominate
        self.add_destination("afrique du sud", -30.55, 22.93, 70.0,
                             "Stress Hydrique (Day Zero)", AFRIQUE);
        self.add_destination("algerie", 28.03, 1.65, 85.0, "Canicules & Sécheresse", AFRIQUE);
        self.add_destination("angola", -11.20, 17.87, 65.0,
                             "Sécheresse Sud & Inondations", AFRIQUE);
        self.add_destination("benin", 9.30, 2.31, 60.0, "Érosion côtière", AFRIQUE);
        self.add_destination("botswana", -22.32, 24.68, 80.0,
                             "Désertification (Kalahari)", AFRIQUE);
        self.add_destination("burkina faso", 12.23, -1.56, 80.0, "Avancée du désert", AFRIQUE);
        self.add_destination("cameroun", 7.36, 12.35, 60.0, "Déforestation", AFRIQUE);
        self.add_destination("cap vert", 16.53, -23.04, 75.0, "Aridité & Ouragans", AFRIQUE);
        self.add_destination("congo", -0.22, 15.82, 55.0, "Déforestation", AFRIQUE);
        self.add_destination("cote d ivoire", 7.54, -5.54, 60.0, "Érosion côtière", AFRIQUE);
        self.add_destination("egypte", 26.82, 30.80, 95.0,
                             "Montée eaux (Delta) & Chaleur", AFRIQUE);
        self.add_destination("ethiopie", 9.14, 40.48, 75.0, "Sécheresse chronique", AFRIQUE);
        self.add_destination("gabon", -0.80, 11.60, 50.0, "Impact modéré", AFRIQUE);
        self.add_destination("ghana", 7.94, -1.02, 60.0, "Érosion côtière", AFRIQUE);
        self.add_destination("kenya", -0.02, 37.90, 70.0, "Saisons des pluies instables", AFRIQUE);
        self.add_destination("madagascar", -18.76, 46.86, 80.0,
                             "Cyclones & Sécheresse Sud", AFRIQUE);
        self.add_destination("maroc", 31.79, -7.09, 85.0, "Stress Hydrique Critique", AFRIQUE);
        self.add_destination("maurice", -20.34, 57.55, 70.0, "Érosion & Coraux", AFRIQUE);
        self.add_destination("mauritanie", 21.00, -10.94, 90.0, "Hyper-aridité", AFRIQUE);
        self.add_destination("mozambique", -18.66, 35.52, 80.0, "Cyclones intenses", AFRIQUE);
        self.add_destination("namibie", -22.95, 18.49, 85.0, "Désertification", AFRIQUE);
        self.add_destination("nigeria", 9.08, 8.67, 70.0, "Chaleur humide & Inondations", AFRIQUE);
        self.add_destination("ouganda", 1.37, 32.29, 60.0, "Agriculture menacée", AFRIQUE);
        self.add_destination("reunion", -21.11, 55.53, 65.0, "Cyclones Tropicaux", AFRIQUE);
        self.add_destination("rwanda", -1.94, 29.87, 55.0, "Érosion des sols", AFRIQUE);
        self.add_destination("senegal", 14.49, -14.45, 80.0,
                             "Montée des eaux (St Louis)", AFRIQUE);
        self.add_destination("seychelles", -4.67, 55.49, 85.0, "Submersion marine", AFRIQUE);
        self.add_destination("soudan", 12.86, 30.21, 95.0, "Inhabitable (Chaleur)", AFRIQUE);
        self.add_destination("tanzanie", -6.36, 34.88, 65.0,
                             "Impact Kilimandjaro & Sécheresse", AFRIQUE);
        self.add_destination("tchad", 15.45, 18.73, 90.0, "Assèchement Lac Tchad", AFRIQUE);
        self.add_destination("togo", 8.61, 0.82, 60.0, "Érosion côtière", AFRIQUE);
        self.add_destination("tunisie", 33.88, 9.53, 85.0, "Sécheresse & Tourisme", AFRIQUE);
        self.add_destination("zambie", -13.13, 27.84, 70.0, "Chute débit Victoria Falls", AFRIQUE);
        self.add_destination("zimbabwe", -19.01, 29.15, 75.0, "Sécheresse extrême", AFRIQUE);

        // Asie: monsoons, glaciers, sea level
        self.add_destination("afghanistan", 33.93, 67.70, 80.0, "Sécheresse & Instabilité", ASIE);
        self.add_destination("arabie saoudite", 23.88, 45.07, 90.0, "Chaleur Extrême", ASIE);
        self.add_destination("armenie", 40.06, 45.03, 55.0, "Désertification", ASIE);
        self.add_destination("azerbaidjan", 40.14, 47.57, 60.0, "Baisse niveau Caspienne", ASIE);
        self.add_destination("bangladesh", 23.68, 90.35, 95.0, "Submersion majeure", ASIE);
        self.add_destination("birmanie", 21.91, 95.95, 75.0, "Cyclones", ASIE);
        self.add_destination("cambodge", 12.56, 104.99, 75.0, "Crues Mékong", ASIE);
        self.add_destination("chine", 35.86, 104.19, 65.0, "Pollution & Désertification", ASIE);
        self.add_destination("coree du sud", 35.90, 127.76, 45.0, "Typhons", ASIE);
        self.add_destination("emirats arabes unis", 23.42, 53.84, 90.0, "Chaleur Humide", ASIE);
        self.add_destination("georgie", 42.31, 43.35, 50.0, "Fonte glaciers Caucase", ASIE);
        self.add_destination("inde", 20.59, 78.96, 85.0, "Vagues chaleur mortelles", ASIE);
        self.add_destination("indonesie", -0.78, 113.92, 80.0, "Montée eaux (Jakarta)", ASIE);
        self.add_destination("irak", 33.22, 43.67, 90.0, "Pénurie Eau (Tigre/Euphrate)", ASIE);
        self.add_destination("iran", 32.42, 53.68, 85.0, "Assèchement complet", ASIE);
        self.add_destination("israel", 31.04, 34.85, 75.0, "Stress Hydrique", ASIE);
        self.add_destination("japon", 36.20, 138.25, 40.0, "Typhons & Vieillissement", ASIE);
        self.add_destination("jordanie", 30.58, 36.23, 90.0, "Pénurie Eau Critique", ASIE);
        self.add_destination("kazakhstan", 48.01, 66.92, 60.0, "Climat continental extrême", ASIE);
        self.add_destination("kirghizistan", 41.20, 74.76, 65.0, "Fonte glaciers Tian Shan", ASIE);
        self.add_destination("laos", 19.85, 102.49, 65.0, "Déforestation", ASIE);
        self.add_destination("liban", 33.85, 35.86, 70.0, "Incendies & Eau", ASIE);
        self.add_destination("malaisie", 4.21, 101.97, 60.0, "Chaleur & Humidité", ASIE);
        self.add_destination("maldives", 3.20, 73.22, 98.0, "Disparition (Montée eaux)", ASIE);
        self.add_destination("mongolie", 46.86, 103.84, 70.0, "Dzud (Hiver extrême)", ASIE);
        self.add_destination("nepal", 28.39, 84.12, 80.0, "Fonte Glaciers Himalaya", ASIE);
        self.add_destination("oman", 21.47, 55.97, 90.0, "Invivable en été", ASIE);
        self.add_destination("ouzbekistan", 41.37, 64.58, 80.0, "Assèchement Aral", ASIE);
        self.add_destination("pakistan", 30.37, 69.34, 90.0,
                             "Inondations monstres & Chaleur", ASIE);
        self.add_destination("philippines", 12.87, 121.77, 85.0, "Super-Typhons", ASIE);
        self.add_destination("sri lanka", 7.87, 80.77, 70.0, "Érosion & Moussons", ASIE);
        self.add_destination("syrie", 34.80, 38.99, 90.0, "Sécheresse historique", ASIE);
        self.add_destination("tadjikistan", 38.86, 71.27, 70.0, "Fonte glaciers Pamir", ASIE);
        self.add_destination("taiwan", 23.69, 120.96, 55.0, "Typhons", ASIE);
        self.add_destination("thailande", 15.87, 100.99, 70.0, "Inondations Bangkok", ASIE);
        self.add_destination("turquie", 38.96, 35.24, 75.0, "Sécheresse Anatolie", ASIE);
        self.add_destination("vietnam", 14.05, 108.27, 80.0, "Submersion Delta Mékong", ASIE);
        self.add_destination("yemen", 15.55, 48.51, 95.0, "Crise humanitaire & Eau", ASIE);

        // Europe: exposed south, northern refuges
        self.add_destination("albanie", 41.15, 20.16, 60.0, "Impact Méditerranéen", EUROPE);
        self.add_destination("allemagne", 51.16, 10.45, 30.0, "Inondations fluviales", EUROPE);
        self.add_destination("autriche", 47.51, 14.55, 35.0, "Moins de neige (Ski)", EUROPE);
        self.add_destination("belgique", 50.50, 4.46, 30.0, "Canicules urbaines", EUROPE);
        self.add_destination("bulgarie", 42.73, 25.48, 55.0, "Sécheresse", EUROPE);
        self.add_destination("chypre", 35.12, 33.42, 85.0, "Désertification", EUROPE);
        self.add_destination("croatie", 45.10, 15.20, 60.0, "Feux de forêt", EUROPE);
        self.add_destination("danemark", 56.26, 9.50, 25.0, "Montée des eaux", EUROPE);
        self.add_destination("espagne", 40.46, -3.74, 85.0, "Désertification massive", EUROPE);
        self.add_destination("finlande", 61.92, 25.74, 15.0, "Zone Refuge (Froid)", EUROPE);
        self.add_destination("france", 46.22, 2.21, 40.0, "Sécheresse Sud & Canicules", EUROPE);
        self.add_destination("grece", 39.07, 21.82, 85.0, "Incendies incontrôlables", EUROPE);
        self.add_destination("hongrie", 47.16, 19.50, 50.0, "Vagues de chaleur", EUROPE);
        self.add_destination("irlande", 53.14, -7.69, 20.0, "Zone Refuge", EUROPE);
        self.add_destination("islande", 64.96, -19.02, 25.0,
                             "Fonte Glaciers / Refuge", EUROPE_POLAIRE);
        self.add_destination("italie", 41.87, 12.56, 80.0, "Canicules & Sécheresse Pô", EUROPE);
        self.add_destination("malte", 35.93, 14.37, 85.0, "Pénurie Eau", EUROPE);
        self.add_destination("montenegro", 42.70, 19.37, 60.0, "Feux de forêt", EUROPE);
        self.add_destination("norvege", 60.47, 8.46, 15.0, "Zone Refuge", EUROPE_POLAIRE);
        self.add_destination("pays bas", 52.13, 5.29, 45.0, "Submersion (Digues)", EUROPE);
        self.add_destination("pologne", 51.91, 19.14, 30.0, "Sécheresse agricole", EUROPE);
        self.add_destination("portugal", 39.39, -8.22, 80.0, "Incendies géants", EUROPE);
        self.add_destination("roumanie", 45.94, 24.96, 50.0, "Saisons marquées", EUROPE);
        self.add_destination("royaume uni", 55.37, -3.43, 25.0, "Zone Refuge Relative", EUROPE);
        self.add_destination("russie", 61.52, 105.31, 40.0, "Fonte Permafrost", EUROPE);
        self.add_destination("slovenie", 46.15, 14.99, 40.0, "Inondations", EUROPE);
        self.add_destination("suede", 60.12, 18.64, 15.0, "Zone Refuge", EUROPE);
        self.add_destination("suisse", 46.81, 8.22, 35.0, "Disparition glaciers", EUROPE);
        self.add_destination("ukraine", 48.37, 31.16, 40.0, "Sécheresse", EUROPE);

        // Amérique: hurricanes and the Andes
        self.add_destination("argentine", -38.41, -63.61, 50.0, "Sécheresse Pampas", AMERIQUE);
        self.add_destination("belize", 17.18, -88.49, 75.0, "Ouragans & Coraux", AMERIQUE);
        self.add_destination("bolivie", -16.29, -63.58, 65.0, "Disparition Lacs", AMERIQUE);
        self.add_destination("bresil", -14.23, -51.92, 60.0, "Déforestation Amazonie", AMERIQUE);
        self.add_destination("canada", 56.13, -106.34, 30.0,
                             "Feux de forêt (mais Refuge)", AMERIQUE);
        self.add_destination("chili", -35.67, -71.54, 70.0, "Méga-Sécheresse", AMERIQUE);
        self.add_destination("colombie", 4.57, -74.29, 55.0, "Glissements terrain", AMERIQUE);
        self.add_destination("costa rica", 9.74, -83.75, 50.0, "Biodiversité menacée", AMERIQUE);
        self.add_destination("cuba", 21.52, -77.78, 80.0, "Ouragans majeurs", AMERIQUE);
        self.add_destination("equateur", -1.83, -78.18, 60.0, "El Niño extrême", AMERIQUE);
        self.add_destination("etats unis", 37.09, -95.71, 50.0,
                             "Risques multiples (Feux/Hurricanes)", AMERIQUE);
        self.add_destination("guatemala", 15.78, -90.23, 70.0,
                             "Sécheresse corridor sec", AMERIQUE);
        self.add_destination("mexique", 23.63, -102.55, 70.0, "Stress Hydrique", AMERIQUE);
        self.add_destination("nicaragua", 12.86, -85.20, 75.0, "Ouragans", AMERIQUE);
        self.add_destination("panama", 8.53, -80.78, 60.0, "Manque eau Canal", AMERIQUE);
        self.add_destination("perou", -9.19, -75.01, 75.0, "Fonte Glaciers Andins", AMERIQUE);
        self.add_destination("uruguay", -32.52, -55.76, 40.0, "Inondations", AMERIQUE);
        self.add_destination("venezuela", 6.42, -66.58, 60.0, "Instabilité climat", AMERIQUE);

        // Océanie and the poles
        self.add_destination("australie", -25.27, 133.77, 80.0, "Incendies géants", OCEANIE);
        self.add_destination("fidji", -17.71, 178.06, 85.0, "Montée des eaux", OCEANIE);
        self.add_destination("nouvelle zelande", -40.90, 174.88, 30.0, "Zone Refuge", OCEANIE);
        self.add_destination("papouasie nouvelle guinee", -6.31, 143.95, 70.0,
                             "Disparition îles", OCEANIE);
        self.add_destination("polynesie", -17.67, -149.40, 85.0, "Submersion Atolls", OCEANIE);
        self.add_destination("antarctique", -82.86, 135.00, 100.0,
                             "Fonte Inéluctable", EUROPE_POLAIRE);
        self.add_destination("groenland", 71.70, -42.60, 95.0, "Point de Bascule", EUROPE_POLAIRE);
        self.add_destination("spitzberg", 78.22, 15.65, 98.0, "Réchauffement x4", EUROPE_POLAIRE);
    }

    /// Load the built-in alias table (English names, codes, spellings)
    pub fn load_default_aliases(&mut self) {
        let aliases: &[(&str, &str)] = &[
            // Americas
            ("usa", "etats unis"),
            ("us", "etats unis"),
            ("united states", "etats unis"),
            ("new york", "etats unis"),
            ("mexico", "mexique"),
            ("brazil", "bresil"),
            ("peru", "perou"),
            ("chile", "chili"),
            ("argentina", "argentine"),
            ("colombia", "colombie"),
            ("bolivia", "bolivie"),
            ("ecuador", "equateur"),
            // Europe
            ("uk", "royaume uni"),
            ("united kingdom", "royaume uni"),
            ("great britain", "royaume uni"),
            ("angleterre", "royaume uni"),
            ("ecosse", "royaume uni"),
            ("england", "royaume uni"),
            ("scotland", "royaume uni"),
            ("spain", "espagne"),
            ("italy", "italie"),
            ("greece", "grece"),
            ("hollande", "pays bas"),
            ("netherlands", "pays bas"),
            ("deutschland", "allemagne"),
            ("germany", "allemagne"),
            ("norway", "norvege"),
            ("iceland", "islande"),
            ("ireland", "irlande"),
            ("sweden", "suede"),
            ("finland", "finlande"),
            ("switzerland", "suisse"),
            ("croatia", "croatie"),
            ("cyprus", "chypre"),
            ("svalbard", "spitzberg"),
            ("greenland", "groenland"),
            // Contains the key "oman"
            ("romania", "roumanie"),
            ("albania", "albanie"),
            ("austria", "autriche"),
            ("belgium", "belgique"),
            ("bulgaria", "bulgarie"),
            ("denmark", "danemark"),
            ("hungary", "hongrie"),
            ("malta", "malte"),
            ("poland", "pologne"),
            ("russia", "russie"),
            ("slovenia", "slovenie"),
            // Africa
            ("morocco", "maroc"),
            ("marrakech", "maroc"),
            ("egypt", "egypte"),
            ("south africa", "afrique du sud"),
            ("cabo verde", "cap vert"),
            ("cape verde", "cap vert"),
            ("tunisia", "tunisie"),
            ("mauritius", "maurice"),
            ("algeria", "algerie"),
            ("cameroon", "cameroun"),
            ("chad", "tchad"),
            ("ethiopia", "ethiopie"),
            ("ivory coast", "cote d ivoire"),
            ("mauritania", "mauritanie"),
            ("namibia", "namibie"),
            ("sudan", "soudan"),
            ("tanzania", "tanzanie"),
            ("uganda", "ouganda"),
            ("zambia", "zambie"),
            // Asia
            ("turkey", "turquie"),
            ("burma", "birmanie"),
            ("myanmar", "birmanie"),
            ("viet nam", "vietnam"),
            ("japan", "japon"),
            ("thailand", "thailande"),
            ("phuket", "thailande"),
            ("indonesia", "indonesie"),
            ("bali", "indonesie"),
            ("india", "inde"),
            ("china", "chine"),
            ("south korea", "coree du sud"),
            ("uae", "emirats arabes unis"),
            ("dubai", "emirats arabes unis"),
            ("united arab emirates", "emirats arabes unis"),
            ("saudi arabia", "arabie saoudite"),
            ("armenia", "armenie"),
            ("azerbaijan", "azerbaidjan"),
            ("cambodia", "cambodge"),
            ("georgia", "georgie"),
            ("iraq", "irak"),
            ("jordan", "jordanie"),
            ("kyrgyzstan", "kirghizistan"),
            ("lebanon", "liban"),
            ("malaysia", "malaisie"),
            ("mongolia", "mongolie"),
            ("syria", "syrie"),
            ("tajikistan", "tadjikistan"),
            ("uzbekistan", "ouzbekistan"),
            // Oceania & poles
            ("nz", "nouvelle zelande"),
            ("new zealand", "nouvelle zelande"),
            ("australia", "australie"),
            ("tahiti", "polynesie"),
            ("french polynesia", "polynesie"),
            ("fiji", "fidji"),
            ("papua new guinea", "papouasie nouvelle guinee"),
            ("antarctica", "antarctique"),
        ];

        for (alias, target) in aliases {
            self.add_alias(alias, target);
        }
    }

    /// Add a destination profile; key is normalized, score clamped to 0-100
    pub fn add_destination(
        &mut self,
        key: &str,
        latitude: f64,
        longitude: f64,
        base_score: f64,
        cause: &str,
        region: &str,
    ) {
        self.profiles.push(RiskProfile {
            key: normalize(key),
            coordinates: Some(Coordinates::new(latitude, longitude)),
            base_score: base_score.clamp(SCORE_MIN, SCORE_MAX),
            cause: cause.to_string(),
            hemisphere: Hemisphere::from_latitude(latitude),
            region: region.to_string(),
        });
    }

    /// Add an alias; both sides are normalized
    pub fn add_alias(&mut self, alias: &str, target: &str) {
        self.aliases.push((normalize(alias), normalize(target)));
    }

    /// Exact lookup by canonical key
    pub fn get(&self, key: &str) -> Option<&RiskProfile> {
        self.profiles.iter().find(|p| p.key == key)
    }

    /// Profiles in declaration order
    pub fn profiles(&self) -> &[RiskProfile] {
        &self.profiles
    }

    /// Aliases in declaration order
    pub fn aliases(&self) -> &[(String, String)] {
        &self.aliases
    }

    pub fn unknown(&self) -> &RiskProfile {
        &self.unknown
    }

    /// Distinct region labels, sorted
    pub fn regions(&self) -> Vec<&str> {
        self.profiles
            .iter()
            .map(|p| p.region.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
