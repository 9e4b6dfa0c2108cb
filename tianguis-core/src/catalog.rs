//! Vendor catalog — the fixed roster of market vendors.
//!
//! The catalog is built once at process start (either the built-in roster or
//! a TOML roster file) and never mutated afterwards. Alongside each vendor it
//! keeps that vendor's fallback lines, the in-character replies used when the
//! generation backend cannot be reached.
//!
//! Roster file format:
//!
//! ```toml
//! [[vendor]]
//! id = "tacos"
//! stand_id = 1
//! display_name = "Don José"
//! difficulty = 7
//! persona_prompt = "Eres Don José, un taquero veterano..."
//! opening_lines = ["¿Qué quieres? Estoy ocupado con mis tacos."]
//! reward_item_name = "tacos al pastor"
//! fallback_lines = ["Interesante... pero no me convences todavía."]
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CoreError, Result};

/// Lines used for any vendor whose fallback table is missing or empty.
pub const GENERIC_FALLBACK_LINES: &[&str] = &[
    "Mmm... déjame pensarlo un poco más.",
    "Ajá... sigue, te escucho.",
    "No sé, no sé... convénceme mejor.",
];

// ---------------------------------------------------------------------------
// Vendor
// ---------------------------------------------------------------------------

/// An immutable catalog entry describing one NPC vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    /// Vendor type key used on the wire and in inventories (e.g. `"tacos"`).
    pub id: String,
    /// Numeric stand id recorded in completed-stand sets.
    pub stand_id: u32,
    /// Name the vendor is addressed by.
    pub display_name: String,
    /// How hard the vendor is to persuade, 1 (pushover) to 10 (stone wall).
    pub difficulty: u8,
    /// Behavioural instructions handed to the generation backend.
    pub persona_prompt: String,
    /// Lines the vendor may open a conversation with. Never empty, and no line is blank.
    pub opening_lines: Vec<String>,
    /// What the vendor hands out as a reward.
    pub reward_item_name: String,
}

impl Vendor {
    /// Pick one of the vendor's opening lines at random.
    #[must_use]
    pub fn pick_opening_line<R: Rng>(&self, rng: &mut R) -> &str {
        self.opening_lines
            .choose(rng)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Public view of a vendor sent to the client on the opening turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorSummary {
    /// Vendor type key.
    pub id: String,
    /// Stand id.
    pub stand_id: u32,
    /// Vendor's name.
    pub display_name: String,
    /// Difficulty 1–10.
    pub difficulty: u8,
    /// What the vendor hands out.
    pub reward_item_name: String,
}

impl From<&Vendor> for VendorSummary {
    fn from(vendor: &Vendor) -> Self {
        Self {
            id: vendor.id.clone(),
            stand_id: vendor.stand_id,
            display_name: vendor.display_name.clone(),
            difficulty: vendor.difficulty,
            reward_item_name: vendor.reward_item_name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Roster file
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RosterFile {
    #[serde(default, rename = "vendor")]
    vendors: Vec<RosterEntry>,
}

#[derive(Debug, Deserialize)]
struct RosterEntry {
    id: String,
    stand_id: u32,
    display_name: String,
    difficulty: u8,
    persona_prompt: String,
    #[serde(default)]
    opening_lines: Vec<String>,
    reward_item_name: String,
    #[serde(default)]
    fallback_lines: Vec<String>,
}

impl RosterEntry {
    fn split(self) -> (Vendor, Vec<String>) {
        let vendor = Vendor {
            id: self.id,
            stand_id: self.stand_id,
            display_name: self.display_name,
            difficulty: self.difficulty,
            persona_prompt: self.persona_prompt,
            opening_lines: self.opening_lines,
            reward_item_name: self.reward_item_name,
        };
        (vendor, self.fallback_lines)
    }
}

// ---------------------------------------------------------------------------
// VendorCatalog
// ---------------------------------------------------------------------------

/// Static registry of vendors and their fallback tables.
#[derive(Debug, Clone)]
pub struct VendorCatalog {
    vendors: BTreeMap<String, Vendor>,
    fallbacks: HashMap<String, Vec<String>>,
}

impl VendorCatalog {
    /// Build a catalog from vendor definitions and fallback tables.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] if the roster is empty, an id or stand id
    /// is duplicated, a difficulty is outside 1–10, or a vendor's opening
    /// lines are missing or include a blank one.
    pub fn new(
        vendors: Vec<Vendor>,
        fallbacks: HashMap<String, Vec<String>>,
    ) -> Result<Self> {
        if vendors.is_empty() {
            return Err(CoreError::Config("vendor roster is empty".into()));
        }

        let mut by_id = BTreeMap::new();
        let mut stands = HashSet::new();
        for vendor in vendors {
            if !(1..=10).contains(&vendor.difficulty) {
                return Err(CoreError::Config(format!(
                    "vendor '{}' has difficulty {} (expected 1-10)",
                    vendor.id, vendor.difficulty
                )));
            }
            if vendor.opening_lines.is_empty() {
                return Err(CoreError::Config(format!(
                    "vendor '{}' has no opening lines",
                    vendor.id
                )));
            }
            if vendor.opening_lines.iter().any(|l| l.trim().is_empty()) {
                return Err(CoreError::Config(format!(
                    "vendor '{}' has a blank opening line",
                    vendor.id
                )));
            }
            if !stands.insert(vendor.stand_id) {
                return Err(CoreError::Config(format!(
                    "stand id {} is used by more than one vendor",
                    vendor.stand_id
                )));
            }
            if fallbacks.get(&vendor.id).is_none_or(Vec::is_empty) {
                warn!(
                    vendor = %vendor.id,
                    "Vendor has no fallback table, the generic one will be used"
                );
            }
            let id = vendor.id.clone();
            if by_id.insert(id.clone(), vendor).is_some() {
                return Err(CoreError::Config(format!("vendor id '{id}' is duplicated")));
            }
        }

        Ok(Self {
            vendors: by_id,
            fallbacks,
        })
    }

    /// Load a roster from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] if the TOML is invalid or the roster
    /// fails validation.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let file: RosterFile =
            toml::from_str(toml_str).map_err(|e| CoreError::Config(e.to_string()))?;

        let mut vendors = Vec::with_capacity(file.vendors.len());
        let mut fallbacks = HashMap::new();
        for entry in file.vendors {
            let (vendor, lines) = entry.split();
            if !lines.is_empty() {
                fallbacks.insert(vendor.id.clone(), lines);
            }
            vendors.push(vendor);
        }
        Self::new(vendors, fallbacks)
    }

    /// Load a roster from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_toml(&content)?;
        info!(path = %path.display(), vendors = catalog.len(), "Loaded vendor roster");
        Ok(catalog)
    }

    /// The built-in market roster.
    #[must_use]
    pub fn builtin() -> Self {
        let mut vendors = Vec::new();
        let mut fallbacks = HashMap::new();
        for def in BUILTIN_VENDORS {
            vendors.push(Vendor {
                id: def.id.to_string(),
                stand_id: def.stand_id,
                display_name: def.display_name.to_string(),
                difficulty: def.difficulty,
                persona_prompt: def.persona.to_string(),
                opening_lines: def.opening_lines.iter().map(ToString::to_string).collect(),
                reward_item_name: def.reward_item_name.to_string(),
            });
            fallbacks.insert(
                def.id.to_string(),
                def.fallback_lines.iter().map(ToString::to_string).collect(),
            );
        }
        Self {
            vendors: vendors.into_iter().map(|v| (v.id.clone(), v)).collect(),
            fallbacks,
        }
    }

    /// Look up a vendor by id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::VendorNotFound`] for unknown ids.
    pub fn get(&self, vendor_id: &str) -> Result<&Vendor> {
        self.vendors
            .get(vendor_id)
            .ok_or_else(|| CoreError::VendorNotFound(vendor_id.to_string()))
    }

    /// The fallback table for a vendor, or the generic table if the vendor
    /// has none.
    #[must_use]
    pub fn fallback_lines(&self, vendor_id: &str) -> Vec<&str> {
        match self.fallbacks.get(vendor_id) {
            Some(lines) if !lines.is_empty() => lines.iter().map(String::as_str).collect(),
            _ => GENERIC_FALLBACK_LINES.to_vec(),
        }
    }

    /// Iterate over all vendors in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Vendor> {
        self.vendors.values()
    }

    /// Number of vendors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    /// Whether the catalog holds no vendors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }
}

impl Default for VendorCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

// ---------------------------------------------------------------------------
// Built-in roster
// ---------------------------------------------------------------------------

struct BuiltinVendor {
    id: &'static str,
    stand_id: u32,
    display_name: &'static str,
    difficulty: u8,
    persona: &'static str,
    opening_lines: &'static [&'static str],
    reward_item_name: &'static str,
    fallback_lines: &'static [&'static str],
}

const BUILTIN_VENDORS: &[BuiltinVendor] = &[
    BuiltinVendor {
        id: "tacos",
        stand_id: 1,
        display_name: "Don José",
        difficulty: 7,
        persona: "Eres Don José, un taquero veterano de 60 años con bigote canoso.
Eres gruñón, desconfiado y directo. Has visto de todo en el tianguis.
No te gustan los halagos falsos ni la gente que da muchas vueltas.
Respetas a quien es honesto y directo contigo.
Hablas con modismos mexicanos y ocasionalmente dices \"órale\" o \"ándale\".
Eres difícil de convencer pero si alguien te cae bien, eres generoso.",
        opening_lines: &[
            "¿Qué quieres? Estoy ocupado con mis tacos.",
            "Ah, otro que viene a pedir. ¿Y tú qué traes?",
            "Mira nomás quién llegó. ¿Vienes a comprar o a molestar?",
        ],
        reward_item_name: "tacos al pastor",
        fallback_lines: &[
            "Mmm... déjame pensar. ¿Y por qué debería darte tacos gratis?",
            "¿Eso es todo lo que tienes? Convénceme mejor.",
            "Interesante... pero no me convences todavía.",
        ],
    },
    BuiltinVendor {
        id: "frutas",
        stand_id: 2,
        display_name: "Doña María",
        difficulty: 3,
        persona: "Eres Doña María, una señora amable de 55 años que vende frutas frescas.
Eres cariñosa, maternal y siempre sonríes. Te gusta platicar con la gente.
Llamas a todos \"mijo\" o \"mija\". Te preocupas por que la gente coma bien.
Eres fácil de convencer porque tienes buen corazón, pero no eres tonta.
Si alguien es grosero, te pones seria.
Te encanta hablar del clima y de tu familia.",
        opening_lines: &[
            "¡Hola mijo! ¿Cómo estás? Mira qué frutas tan bonitas tengo hoy.",
            "¡Ay qué bueno que llegaste! ¿Qué se te antoja?",
            "Pásale, pásale. Las frutas están fresquecitas.",
        ],
        reward_item_name: "frutas frescas",
        fallback_lines: &[
            "¡Ay mijo! Qué cosas dices. Cuéntame más.",
            "Mmm, está bien, pero necesito saber más de ti.",
            "¡Qué lindo! Pero las frutas no son gratis, ¿eh?",
        ],
    },
    BuiltinVendor {
        id: "dulces",
        stand_id: 3,
        display_name: "Don Pedro",
        difficulty: 5,
        persona: "Eres Don Pedro, un señor de 50 años que vende dulces típicos mexicanos.
Eres alegre, bromista y te encanta contar chistes malos.
Tienes una risa contagiosa. A veces te pones nostálgico hablando de tu infancia.
Te gustan los clientes que siguen tus bromas y tienen buen humor.
Si alguien es muy serio, intentas hacerlo reír.
Dificultad media: ni muy fácil ni muy difícil de convencer.",
        opening_lines: &[
            "¡Órale! ¿Ya viste mis dulces? Están más buenos que el chisme de la vecina.",
            "¿Qué onda? ¿Vienes por algo dulce para endulzar el día?",
            "¡Pásale! Tengo dulces que te van a hacer sonreír.",
        ],
        reward_item_name: "dulces típicos mexicanos",
        fallback_lines: &[
            "¡Ja! Esa estuvo buena. ¿Qué más tienes?",
            "Me caes bien, pero necesitas convencerme más.",
            "Órale, órale, sigue platicando.",
        ],
    },
    BuiltinVendor {
        id: "elotes",
        stand_id: 4,
        display_name: "Doña Carmen",
        difficulty: 6,
        persona: "Eres Doña Carmen, una señora de 45 años que vende elotes preparados.
Eres trabajadora, práctica y no te gustan las tonterías.
Valoras mucho el esfuerzo y el trabajo duro.
Te molesta la gente floja o que quiere todo regalado.
Si alguien demuestra que es trabajador o tiene una buena razón, te ablandas.
Hablas rápido porque siempre estás ocupada.",
        opening_lines: &[
            "¿Qué va a llevar? Tengo elotes con todo, rápido que hay fila.",
            "Buenas. Los elotes están recién hechos. ¿Cuántos?",
            "¿Vienes a comprar o a ver? Dime rápido que tengo mucho trabajo.",
        ],
        reward_item_name: "elotes preparados",
        fallback_lines: &[
            "Ajá, y luego... ¿qué más?",
            "Mira, estoy ocupada, pero te escucho.",
            "Eso no es suficiente. Convénceme.",
        ],
    },
    BuiltinVendor {
        id: "pan",
        stand_id: 5,
        display_name: "Doña Rosa",
        difficulty: 4,
        persona: "Eres Doña Rosa, una señora de 58 años que tiene una panadería tradicional.
Eres dulce, paciente y te encanta hablar de tus recetas de pan.
Llevas 30 años haciendo pan y estás muy orgullosa de tu oficio.
Te gustan los clientes educados y que aprecian el buen pan.
Si alguien muestra interés genuino en la panadería, te emocionas.
A veces te pones sentimental hablando de tu difunto esposo que te enseñó a hacer pan.",
        opening_lines: &[
            "Buenos días. ¿Huele rico verdad? Es pan recién horneado.",
            "Pásale, pásale. ¿Qué pancito se te antoja hoy?",
            "¡Hola! Mira qué conchas tan bonitas me quedaron hoy.",
        ],
        reward_item_name: "pan dulce mexicano",
        fallback_lines: &[
            "Qué bonito lo que dices. Cuéntame más.",
            "Me recuerdas a alguien... sigue platicando.",
            "El pan es mi orgullo. ¿Por qué debería dártelo?",
        ],
    },
];
