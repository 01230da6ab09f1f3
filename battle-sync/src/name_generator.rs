/// Name generation for shareable room names
use markov_namegen::{CharacterChainGenerator, RandomTextGenerator};

/// Place-like words used as training data, so rooms read like level names
const TRAINING_NAMES: &[&str] = &[
    "Koopa", "Goomba", "Bowser", "Toad", "Yoshi", "Lakitu", "Boo", "Wiggler",
    "Castle", "Fortress", "Tower", "Bridge", "Desert", "Forest", "Island", "Valley",
    "Cavern", "Lagoon", "Meadow", "Canyon", "Summit", "Harbor", "Grotto", "Plateau",
    "Brick", "Pipe", "Block", "Coin", "Star", "Cloud", "Vine", "Lava",
    "Mushroom", "Flower", "Shell", "Spring", "Cannon", "Thwomp", "Spiny", "Blooper",
];

fn create_name_generator() -> CharacterChainGenerator {
    CharacterChainGenerator::builder()
        .with_order(2)
        .with_prior(0.01)
        .train(TRAINING_NAMES.iter().copied())
        .build()
}

/// Generate a pronounceable random name of at most 12 alphanumeric characters
pub fn generate_random_name() -> String {
    let mut generator = create_name_generator();

    loop {
        let name = generator.generate_one();
        if !name.is_empty() && name.len() <= 12 && name.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return name;
        }
    }
}

/// Generate a random name with a numeric suffix, like "Grotower_417"
pub fn generate_unique_name() -> String {
    let base_name = generate_random_name();
    let suffix: u16 = rand::random::<u16>() % 1000;
    format!("{}_{}", base_name, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_random_name() {
        let name = generate_random_name();
        assert!(!name.is_empty());
        assert!(name.len() <= 12);
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_unique_name() {
        let name = generate_unique_name();
        let parts: Vec<&str> = name.split('_').collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
    }
}
